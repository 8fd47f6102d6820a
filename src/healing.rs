//! Incremental repair after agents leave or fail.
//!
//! Removal healing tops former neighbours back up to `min_connections`.
//! Failure healing keeps the failed node and its links, and gives each of its
//! neighbours one extra path around it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::config::TopologyConfig;
use crate::topology::{connect_with_room, optimal_connections, ConnectionKey, SelectionLimits, TopologyGraph};

/// Outcome of a healing pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealingReport {
    pub added: Vec<ConnectionKey>,
    /// Nodes left below `min_connections` for lack of candidates
    pub under_connected: Vec<AgentId>,
}

impl HealingReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.under_connected.is_empty()
    }
}

fn limits(config: &TopologyConfig) -> SelectionLimits {
    SelectionLimits {
        min_connections: config.min_connections,
        max_connections: config.max_connections,
    }
}

/// Restore former neighbours of a removed agent to `min_connections`
pub fn heal_after_removal<R: Rng + ?Sized>(
    graph: &mut TopologyGraph,
    former_neighbors: &[AgentId],
    config: &TopologyConfig,
    rng: &mut R,
    now: DateTime<Utc>,
) -> HealingReport {
    let mut report = HealingReport::default();

    for peer in former_neighbors {
        if !graph.contains(peer) {
            continue;
        }
        let degree = graph.degree(peer);
        if degree >= config.min_connections {
            continue;
        }
        if !config.healing_enabled {
            report.under_connected.push(peer.clone());
            continue;
        }

        let needed = config.min_connections - degree;
        let exclude: HashSet<AgentId> = graph.neighbors(peer).into_iter().collect();
        let candidates = optimal_connections(graph, peer, config.topology_type, limits(config), &exclude, rng);

        let mut added = 0usize;
        for candidate in candidates {
            if added == needed {
                break;
            }
            if connect_with_room(graph, peer, &candidate, limits(config), now) {
                report.added.push(ConnectionKey::new(peer, &candidate));
                added += 1;
            }
        }

        if added < needed {
            debug!(
                "'{}' remains under-connected ({} of {} connections)",
                peer,
                degree + added,
                config.min_connections
            );
            report.under_connected.push(peer.clone());
        }
    }

    if !report.added.is_empty() {
        info!("Removal healing added {} connections", report.added.len());
    }
    report
}

/// Flag an agent as failed: zero success rate, fresh `last_seen`, degraded
/// node and recomputed reliability on its links.
///
/// Returns false if the agent is unknown.
pub fn mark_failed(graph: &mut TopologyGraph, agent_id: &str, now: DateTime<Utc>) -> bool {
    let Some(node) = graph.node_mut(agent_id) else {
        warn!("Ignoring failure report for unknown agent '{}'", agent_id);
        return false;
    };
    node.agent.performance.success_rate = 0.0;
    node.agent.last_seen = now;
    node.degraded = true;
    graph.refresh_reliability(agent_id);
    true
}

/// Give every neighbour of a failed agent with spare capacity one
/// alternative connection that avoids the failed agent
pub fn heal_after_failure<R: Rng + ?Sized>(
    graph: &mut TopologyGraph,
    failed_id: &str,
    config: &TopologyConfig,
    rng: &mut R,
    now: DateTime<Utc>,
) -> HealingReport {
    let mut report = HealingReport::default();
    if !config.healing_enabled || !graph.contains(failed_id) {
        return report;
    }

    let degraded: Vec<AgentId> = graph
        .nodes()
        .filter(|node| node.degraded)
        .map(|node| node.id().to_string())
        .collect();

    for peer in graph.neighbors(failed_id) {
        if graph.degree(&peer) >= config.max_connections {
            continue;
        }

        let mut exclude: HashSet<AgentId> = graph.neighbors(&peer).into_iter().collect();
        exclude.insert(failed_id.to_string());
        exclude.extend(degraded.iter().cloned());

        let candidates = optimal_connections(graph, &peer, config.topology_type, limits(config), &exclude, rng);
        let alternative = candidates
            .into_iter()
            .find(|candidate| connect_with_room(graph, &peer, candidate, limits(config), now));

        match alternative {
            Some(candidate) => report.added.push(ConnectionKey::new(&peer, &candidate)),
            None => debug!("No alternative route for '{}' around '{}'", peer, failed_id),
        }
    }

    if !report.added.is_empty() {
        info!(
            "Failure healing around '{}' added {} connections",
            failed_id,
            report.added.len()
        );
    }
    report
}
