//! Optimization strategy interface.
//!
//! The manager drives one strategy through [`OptimizationStrategy::optimize`]
//! while holding the graph lock. Only the default pass is implemented; the
//! search-based kinds are reserved names that resolve to it until someone
//! plugs in a real implementation through [`crate::TopologyManager::with_strategy`].

use chrono::{DateTime, Utc};
use log::warn;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::default::DefaultStrategy;
use super::LoadAnalysis;
use crate::analysis::TopologyMetrics;
use crate::config::TopologyConfig;
use crate::topology::{TopologyGraph, TopologyType};

/// Which optimizer drives the closed loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Analyze, pick a layout family, prune, extend and rebalance
    #[default]
    Default,
    /// Evolve candidate edge sets against the efficiency score
    Genetic,
    /// Particle-swarm search over layout parameters
    Swarm,
    /// Learn layout decisions from observed metric rewards
    ReinforcementLearning,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Default => "default",
            StrategyKind::Genetic => "genetic",
            StrategyKind::Swarm => "swarm",
            StrategyKind::ReinforcementLearning => "reinforcement_learning",
        }
    }

    /// Instantiate the strategy for this kind
    pub fn build(self) -> Box<dyn OptimizationStrategy> {
        match self {
            StrategyKind::Default => Box::new(DefaultStrategy),
            other => {
                warn!(
                    "No built-in implementation for the {} strategy, using the default pass",
                    other.as_str()
                );
                Box::new(DefaultStrategy)
            }
        }
    }
}

/// Mutable view of the manager state handed to a strategy
pub struct OptimizationContext<'a> {
    pub graph: &'a mut TopologyGraph,
    /// `topology_type` is the only field a strategy may change
    pub config: &'a mut TopologyConfig,
    /// Metrics as of the last structural change
    pub metrics: &'a TopologyMetrics,
    pub rng: &'a mut StdRng,
    pub now: DateTime<Utc>,
}

/// What an optimization pass did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub previous_type: TopologyType,
    pub topology_type: TopologyType,
    pub migrated: bool,
    pub pruned: usize,
    pub extended: usize,
    pub rebalanced: usize,
    /// Links dropped to bring nodes back within `max_connections`
    pub shed: usize,
    pub analysis: LoadAnalysis,
}

impl OptimizationReport {
    /// A pass that left the topology untouched
    pub fn unchanged(topology_type: TopologyType, analysis: LoadAnalysis) -> Self {
        Self {
            previous_type: topology_type,
            topology_type,
            migrated: false,
            pruned: 0,
            extended: 0,
            rebalanced: 0,
            shed: 0,
            analysis,
        }
    }
}

/// A pluggable topology optimizer
pub trait OptimizationStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Reshape the graph in place and describe what changed
    fn optimize(&self, ctx: &mut OptimizationContext<'_>) -> OptimizationReport;
}
