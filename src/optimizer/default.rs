//! The built-in optimization pass.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::{debug, info};

use super::strategy::{OptimizationContext, OptimizationReport, OptimizationStrategy, StrategyKind};
use super::{analyze_load, decide_target, LoadAnalysis};
use crate::agent::AgentId;
use crate::config::TopologyConfig;
use crate::topology::{
    build_topology, optimal_connections, score, shed_weakest, SelectionLimits, TopologyGraph, TopologyType,
};

/// Connections below this reliability are dropped
pub const MIN_RELIABILITY: f64 = 0.5;
/// New links a single under-connected node may gain per pass
const EXTENSIONS_PER_NODE: usize = 2;

/// Analyze, migrate, prune, extend, rebalance, shed
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStrategy;

impl OptimizationStrategy for DefaultStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Default
    }

    fn optimize(&self, ctx: &mut OptimizationContext<'_>) -> OptimizationReport {
        let analysis = analyze_load(ctx.graph, ctx.config.rebalance_threshold);
        let previous_type = ctx.config.topology_type;
        let target = decide_target(ctx.graph.node_count(), &analysis, ctx.metrics);

        let migrated = target != previous_type;
        if migrated {
            info!("Migrating topology from {} to {}", previous_type, target);
            build_topology(ctx.graph, target, ctx.config.adaptation_rate, ctx.rng, ctx.now);
            ctx.config.topology_type = target;
        }

        let pruned = prune_connections(ctx.graph, ctx.config, ctx.now);
        let extended = extend_connections(ctx, target);
        let rebalanced = rebalance(ctx.graph, &analysis, ctx.now);
        let shed = shed_excess(ctx.graph, ctx.config);

        debug!(
            "Optimization pass: pruned={} extended={} rebalanced={} shed={}",
            pruned, extended, rebalanced, shed
        );

        OptimizationReport {
            previous_type,
            topology_type: target,
            migrated,
            pruned,
            extended,
            rebalanced,
            shed,
            analysis,
        }
    }
}

/// Drop unreliable links and links idle for longer than the inactivity timeout
pub fn prune_connections(graph: &mut TopologyGraph, config: &TopologyConfig, now: DateTime<Utc>) -> usize {
    let timeout = config.inactivity_timeout;
    let removed = graph.retain_connections(|_, connection| {
        let idle_too_long = (now - connection.last_active)
            .to_std()
            .map(|idle| idle > timeout)
            .unwrap_or(false);
        connection.reliability >= MIN_RELIABILITY && !idle_too_long
    });

    for key in &removed {
        debug!("Pruned connection {}", key);
    }
    removed.len()
}

/// Give nodes below `max_connections` up to two more high-scoring links
fn extend_connections(ctx: &mut OptimizationContext<'_>, target: TopologyType) -> usize {
    let limits = SelectionLimits {
        min_connections: ctx.config.min_connections,
        max_connections: ctx.config.max_connections,
    };
    let max = ctx.config.max_connections;
    let degraded: HashSet<AgentId> = ctx
        .graph
        .nodes()
        .filter(|node| node.degraded)
        .map(|node| node.id().to_string())
        .collect();

    let mut extended = 0usize;
    for id in ctx.graph.ids().to_vec() {
        if degraded.contains(&id) || ctx.graph.degree(&id) >= max {
            continue;
        }

        let mut exclude: HashSet<AgentId> = ctx.graph.neighbors(&id).into_iter().collect();
        exclude.extend(degraded.iter().cloned());

        let mut added = 0usize;
        for candidate in optimal_connections(ctx.graph, &id, target, limits, &exclude, ctx.rng) {
            if added == EXTENSIONS_PER_NODE || ctx.graph.degree(&id) >= max {
                break;
            }
            if ctx.graph.degree(&candidate) >= max {
                continue;
            }
            if ctx.graph.connect(&id, &candidate, ctx.now) {
                added += 1;
            }
        }
        extended += added;
    }
    extended
}

/// Link each bottleneck without an underutilized neighbour to its
/// best-scoring underutilized peer
pub fn rebalance(graph: &mut TopologyGraph, analysis: &LoadAnalysis, now: DateTime<Utc>) -> usize {
    let mut added = 0usize;

    for hot in &analysis.bottlenecks {
        let Some(hot_agent) = graph.agent(hot) else {
            continue;
        };
        let neighbors = graph.neighbors(hot);
        if neighbors.iter().any(|n| analysis.is_underutilized(n)) {
            continue;
        }

        let best = analysis
            .underutilized
            .iter()
            .filter(|id| !neighbors.contains(id))
            .filter_map(|id| graph.agent(id).map(|agent| (id, score(hot_agent, agent))))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(id, _)| id.clone());

        if let Some(idle) = best {
            if graph.connect(hot, &idle, now) {
                debug!("Rebalanced bottleneck '{}' onto '{}'", hot, idle);
                added += 1;
            }
        }
    }
    added
}

/// Bring nodes above `max_connections` back down, weakest links first.
/// A link is only dropped if its far end keeps `min_connections`.
pub fn shed_excess(graph: &mut TopologyGraph, config: &TopologyConfig) -> usize {
    let mut shed = 0usize;
    for id in graph.ids().to_vec() {
        while graph.degree(&id) > config.max_connections {
            if shed_weakest(graph, &id, config.min_connections, None).is_none() {
                debug!("'{}' stays above max_connections", id);
                break;
            }
            shed += 1;
        }
    }
    shed
}
