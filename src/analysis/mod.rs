//! Topology analysis for the adaptive topology manager.
//!
//! This module provides the metrics engine: path lengths, clustering,
//! centrality, Monte-Carlo resilience, load balance and the composite
//! efficiency score.

pub mod types;
pub mod network_graph;
pub mod network_resilience;
pub mod centrality;
pub mod metrics;

pub use types::*;
pub use network_graph::{degree_stats, generate_dot};
pub use network_resilience::connected_components;
pub use metrics::{load_balance, refresh_metrics, std_dev};
