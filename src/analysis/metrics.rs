//! Metrics engine.
//!
//! [`refresh_metrics`] recomputes every metric and every node's centrality
//! from the current graph. There is no incremental path: callers run it after
//! each structural change and publish the returned value as a whole.

use log::debug;
use rand::Rng;

use super::centrality::compute_centrality;
use super::network_graph::{all_pairs_bfs, clustering_coefficient, connectivity, path_statistics};
use super::network_resilience::{monte_carlo_resilience, RESILIENCE_TRIALS};
use super::types::{efficiency, TopologyMetrics};
use crate::topology::TopologyGraph;

/// Recompute all metrics and write fresh centrality vectors into the nodes
pub fn refresh_metrics<R: Rng + ?Sized>(graph: &mut TopologyGraph, rng: &mut R) -> TopologyMetrics {
    if graph.is_empty() {
        return TopologyMetrics::empty();
    }

    let index = graph.adjacency();
    let trees = all_pairs_bfs(&index);

    let centrality = compute_centrality(&index.adjacency, &trees);
    for (id, scores) in index.ids.iter().zip(centrality) {
        if let Some(node) = graph.node_mut(id) {
            node.centrality = scores;
        }
    }

    let loads: Vec<f64> = graph.agents().map(|agent| agent.load).collect();
    let (average_path_length, network_diameter) = path_statistics(&trees);
    let connectivity = connectivity(graph.node_count(), graph.connection_count());
    let load_balance = load_balance(&loads);
    let resilience = monte_carlo_resilience(&index.adjacency, RESILIENCE_TRIALS, rng);

    let metrics = TopologyMetrics {
        efficiency: efficiency(connectivity, load_balance, resilience, average_path_length),
        resilience,
        connectivity,
        load_balance,
        average_path_length,
        network_diameter,
        clustering_coefficient: clustering_coefficient(&index.adjacency),
    };

    debug!(
        "Metrics: efficiency={:.3} connectivity={:.3} resilience={:.2} load_balance={:.3}",
        metrics.efficiency, metrics.connectivity, metrics.resilience, metrics.load_balance
    );
    metrics
}

/// Population standard deviation; 0 for fewer than two values
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// 1 − stddev of the loads, floored at 0
pub fn load_balance(loads: &[f64]) -> f64 {
    (1.0 - std_dev(loads)).clamp(0.0, 1.0)
}
