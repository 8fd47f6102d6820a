//! Network topology module.
//!
//! This module contains the connectivity graph, the pairwise scorer, candidate
//! selection for incremental links and the whole-topology builders.

pub mod types;
pub mod graph;
pub mod scorer;
pub mod connections;
pub mod builders;

// Re-export key types and functions for easier access
pub use types::TopologyType;
pub use graph::{AdjacencyIndex, Centrality, Connection, ConnectionKey, Node, TopologyGraph};
pub use scorer::score;
pub use connections::{connect_with_room, optimal_connections, shed_weakest, SelectionLimits};
pub use builders::build_topology;
