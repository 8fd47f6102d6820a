//! Agent model: the participants whose connectivity is managed.

pub mod types;

pub use types::{Agent, AgentId, AgentType, Location, Performance};
