//! Topology manager configuration.
//!
//! The configuration is supplied once when the manager is constructed. Only
//! `topology_type` changes afterwards, as the optimizer migrates between
//! layouts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::optimizer::StrategyKind;
use crate::topology::TopologyType;

/// Largest topology for which all-pairs BFS and Monte-Carlo resilience are
/// still run synchronously on the mutation path
pub const MAX_SUPPORTED_NODES: usize = 1000;

/// Configuration of a [`crate::TopologyManager`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Current layout family; adjusted by the optimizer
    #[serde(rename = "type")]
    pub topology_type: TopologyType,
    pub max_nodes: usize,
    pub min_connections: usize,
    pub max_connections: usize,
    /// Loads below this value count as underutilized
    pub rebalance_threshold: f64,
    pub healing_enabled: bool,
    /// Per-edge rewiring probability for small-world layouts
    pub adaptation_rate: f64,
    pub target_efficiency: f64,
    /// Seed for the injected random source; entropy when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub strategy: StrategyKind,
    /// Capacity of the performance history ring buffer
    pub history_capacity: usize,
    #[serde(with = "humantime_serde")]
    pub sampling_interval: Duration,
    /// Connections idle for longer than this are pruned by the optimizer
    #[serde(with = "humantime_serde")]
    pub inactivity_timeout: Duration,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            topology_type: TopologyType::Hybrid,
            max_nodes: 100,
            min_connections: 2,
            max_connections: 8,
            rebalance_threshold: 0.2,
            healing_enabled: true,
            adaptation_rate: 0.1,
            target_efficiency: 0.8,
            seed: None,
            strategy: StrategyKind::Default,
            history_capacity: 100,
            sampling_interval: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(300),
        }
    }
}

impl TopologyConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_nodes == 0 || self.max_nodes > MAX_SUPPORTED_NODES {
            return Err(ValidationError::InvalidLimits(format!(
                "max_nodes must be within 1..={}, got {}",
                MAX_SUPPORTED_NODES, self.max_nodes
            )));
        }

        if self.max_connections == 0 {
            return Err(ValidationError::InvalidLimits(
                "max_connections must be at least 1".to_string(),
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(ValidationError::InvalidLimits(format!(
                "min_connections ({}) cannot exceed max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }

        let unit_fields = [
            ("rebalance_threshold", self.rebalance_threshold),
            ("adaptation_rate", self.adaptation_rate),
            ("target_efficiency", self.target_efficiency),
        ];
        for (name, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::InvalidThreshold(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.history_capacity == 0 {
            return Err(ValidationError::InvalidSampling(
                "history_capacity must be at least 1".to_string(),
            ));
        }

        if self.sampling_interval.is_zero() {
            return Err(ValidationError::InvalidSampling(
                "sampling_interval cannot be zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid connection or node limits: {0}")]
    InvalidLimits(String),
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("Invalid sampling configuration: {0}")]
    InvalidSampling(String),
}
