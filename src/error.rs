//! Errors surfaced to the orchestrator.
//!
//! Everything else (unknown ids, empty candidate lists, disconnected graphs)
//! is absorbed locally and logged.

use crate::agent::AgentId;

/// Errors returned at the manager boundary
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TopologyError {
    #[error("Topology is at capacity ({max_nodes} agents), cannot add '{id}'")]
    CapacityExceeded { id: AgentId, max_nodes: usize },

    #[error("Agent '{0}' is already registered")]
    DuplicateAgent(AgentId),

    #[error("Agent '{0}' is not registered")]
    UnknownAgent(AgentId),

    #[error("Invalid agent '{id}': {reason}")]
    InvalidAgent { id: AgentId, reason: String },
}
