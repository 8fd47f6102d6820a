//! Closed-loop topology optimization.
//!
//! [`should_optimize`] decides when a pass is due, [`analyze_load`] and
//! [`decide_target`] feed the decision of which layout family to move to, and
//! an [`OptimizationStrategy`] carries the pass out.

pub mod strategy;
pub mod default;

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::analysis::{std_dev, TopologyMetrics};
use crate::config::TopologyConfig;
use crate::topology::{TopologyGraph, TopologyType};

pub use default::DefaultStrategy;
pub use strategy::{OptimizationContext, OptimizationReport, OptimizationStrategy, StrategyKind};

/// Loads above this mark an agent as a bottleneck
pub const BOTTLENECK_LOAD: f64 = 0.8;
/// Margin over the mean betweenness that marks a node as a critical path
pub const CRITICAL_BETWEENNESS_MARGIN: f64 = 0.2;
/// An automatic pass is triggered below either floor
pub const MIN_LOAD_BALANCE: f64 = 0.6;
pub const MIN_RESILIENCE: f64 = 0.5;

/// Load and centrality profile of the current graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadAnalysis {
    pub bottlenecks: Vec<AgentId>,
    pub underutilized: Vec<AgentId>,
    pub critical_paths: Vec<AgentId>,
    pub average_load: f64,
    pub load_std_dev: f64,
}

impl LoadAnalysis {
    pub fn is_bottleneck(&self, id: &str) -> bool {
        self.bottlenecks.iter().any(|b| b == id)
    }

    pub fn is_underutilized(&self, id: &str) -> bool {
        self.underutilized.iter().any(|u| u == id)
    }
}

/// Whether the metrics call for an optimization pass
pub fn should_optimize(metrics: &TopologyMetrics, config: &TopologyConfig) -> bool {
    metrics.efficiency < config.target_efficiency
        || metrics.load_balance < MIN_LOAD_BALANCE
        || metrics.resilience < MIN_RESILIENCE
}

/// Classify agents by load and find the nodes carrying most shortest paths.
///
/// Relies on the centrality written by the last metrics refresh.
pub fn analyze_load(graph: &TopologyGraph, underutilized_below: f64) -> LoadAnalysis {
    let loads: Vec<f64> = graph.agents().map(|agent| agent.load).collect();
    if loads.is_empty() {
        return LoadAnalysis::default();
    }

    let average_load = loads.iter().sum::<f64>() / loads.len() as f64;
    let mean_betweenness =
        graph.nodes().map(|node| node.centrality.betweenness).sum::<f64>() / graph.node_count() as f64;

    let mut analysis = LoadAnalysis {
        average_load,
        load_std_dev: std_dev(&loads),
        ..Default::default()
    };

    for node in graph.nodes() {
        let load = node.agent.load;
        if load > BOTTLENECK_LOAD {
            analysis.bottlenecks.push(node.id().to_string());
        } else if load < underutilized_below {
            analysis.underutilized.push(node.id().to_string());
        }
        if node.centrality.betweenness > mean_betweenness + CRITICAL_BETWEENNESS_MARGIN {
            analysis.critical_paths.push(node.id().to_string());
        }
    }

    analysis
}

/// Pick the layout family for the next pass; the first matching rule wins
pub fn decide_target(node_count: usize, analysis: &LoadAnalysis, metrics: &TopologyMetrics) -> TopologyType {
    if node_count < 5 {
        TopologyType::Mesh
    } else if analysis.load_std_dev > 0.3 {
        TopologyType::Hierarchical
    } else if analysis.average_load > 0.7 && !analysis.bottlenecks.is_empty() {
        TopologyType::ScaleFree
    } else if metrics.resilience < 0.6 {
        TopologyType::Mesh
    } else if node_count > 20 {
        TopologyType::SmallWorld
    } else {
        TopologyType::Hybrid
    }
}
