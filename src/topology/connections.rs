//! Candidate selection for incremental connections.
//!
//! This file decides which peers an agent should connect to when it joins,
//! when healing needs replacements, and when the optimizer extends sparse
//! nodes. Candidates are ranked by pairwise score and the tail of the list is
//! shaped by the current topology family. [`connect_with_room`] keeps the
//! chosen peer within `max_connections` while linking.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::agent::{AgentId, AgentType};
use crate::topology::graph::{ConnectionKey, TopologyGraph};
use crate::topology::scorer::score;
use crate::topology::types::TopologyType;

/// Scores above this are worth an extra mesh link
const MESH_EXTENSION_SCORE: f64 = 0.6;
const HIERARCHY_COORDINATORS: usize = 2;
const HIERARCHY_PEERS: usize = 3;
const SMALL_WORLD_LOCAL: usize = 3;
const SMALL_WORLD_RANDOM: usize = 2;

/// Limits applied while selecting candidates
#[derive(Debug, Clone, Copy)]
pub struct SelectionLimits {
    pub min_connections: usize,
    pub max_connections: usize,
}

struct Candidate<'a> {
    id: &'a str,
    agent_type: AgentType,
    score: f64,
    /// Below `max_connections`
    has_room: bool,
}

/// Rank every other node for `agent_id` and pick the ones worth connecting to.
///
/// The top `min(min_connections, candidates)` are always returned; the rest
/// depends on `topology`:
///
/// * Mesh: further candidates scoring above 0.6, up to `max_connections`
/// * Hierarchical, Hybrid, Scale-free: up to 2 coordinators and 3 same-type peers
/// * Small-world: the next 3 best candidates plus 2 random ones
/// * Star, Ring: nothing beyond the base set
///
/// Candidates below `max_connections` rank ahead of full ones. Full
/// candidates only fill the base set when too few others have room, and
/// never the extension. Ids in `exclude` are never returned. The result is
/// de-duplicated and may be empty; an unknown `agent_id` yields an empty list.
pub fn optimal_connections<R: Rng + ?Sized>(
    graph: &TopologyGraph,
    agent_id: &str,
    topology: TopologyType,
    limits: SelectionLimits,
    exclude: &HashSet<AgentId>,
    rng: &mut R,
) -> Vec<AgentId> {
    let Some(agent) = graph.agent(agent_id) else {
        warn!("Cannot select connections for unknown agent '{}'", agent_id);
        return Vec::new();
    };

    let mut ranked: Vec<Candidate> = graph
        .agents()
        .filter(|other| other.id != agent_id && !exclude.contains(&other.id))
        .map(|other| Candidate {
            id: other.id.as_str(),
            agent_type: other.agent_type,
            score: score(agent, other),
            has_room: graph.degree(&other.id) < limits.max_connections,
        })
        .collect();

    // Stable sort keeps insertion order among equal scores
    ranked.sort_by(|a, b| {
        b.has_room
            .cmp(&a.has_room)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
    });

    let base = limits.min_connections.min(ranked.len());
    let mut selected: Vec<&str> = ranked[..base].iter().map(|c| c.id).collect();
    let capacity = limits.max_connections.max(base);
    let rest: Vec<&Candidate> = ranked[base..].iter().filter(|c| c.has_room).collect();

    match topology {
        TopologyType::Mesh => {
            for candidate in &rest {
                if selected.len() >= capacity {
                    break;
                }
                if candidate.score > MESH_EXTENSION_SCORE {
                    selected.push(candidate.id);
                }
            }
        }
        TopologyType::Hierarchical | TopologyType::Hybrid | TopologyType::ScaleFree => {
            let coordinators = rest
                .iter()
                .filter(|c| c.agent_type == AgentType::Coordinator)
                .take(HIERARCHY_COORDINATORS);
            for candidate in coordinators {
                if selected.len() >= capacity {
                    break;
                }
                selected.push(candidate.id);
            }

            let peers = rest
                .iter()
                .filter(|c| c.agent_type == agent.agent_type && !selected.contains(&c.id))
                .take(HIERARCHY_PEERS)
                .map(|c| c.id)
                .collect::<Vec<_>>();
            for id in peers {
                if selected.len() >= capacity {
                    break;
                }
                selected.push(id);
            }
        }
        TopologyType::SmallWorld => {
            for candidate in rest.iter().take(SMALL_WORLD_LOCAL) {
                if selected.len() >= capacity {
                    break;
                }
                selected.push(candidate.id);
            }

            let remaining: Vec<&str> = rest
                .iter()
                .map(|c| c.id)
                .filter(|id| !selected.contains(id))
                .collect();
            let room = capacity.saturating_sub(selected.len()).min(SMALL_WORLD_RANDOM);
            selected.extend(remaining.choose_multiple(rng, room).copied());
        }
        TopologyType::Star | TopologyType::Ring => {}
    }

    let mut seen = HashSet::new();
    selected
        .into_iter()
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Link `a` to `b`. When `b` is already at `max_connections` its weakest
/// link is shed first, but only towards a peer that keeps at least
/// `min_connections`; if no such link exists `b` goes over the limit.
///
/// Returns false if either id is unknown or the pair is already linked.
pub fn connect_with_room(
    graph: &mut TopologyGraph,
    a: &str,
    b: &str,
    limits: SelectionLimits,
    now: DateTime<Utc>,
) -> bool {
    if a == b || !graph.contains(a) || !graph.contains(b) || graph.are_connected(a, b) {
        return graph.connect(a, b, now);
    }
    let full = graph.degree(b) >= limits.max_connections;
    if full && shed_weakest(graph, b, limits.min_connections, Some(a)).is_none() {
        debug!("'{}' exceeds max_connections to accept '{}'", b, a);
    }
    graph.connect(a, b, now)
}

/// Drop the lowest-weight link of `id` whose far end has more than `min`
/// links. The link to `keep` is never chosen.
pub fn shed_weakest(graph: &mut TopologyGraph, id: &str, min: usize, keep: Option<&str>) -> Option<ConnectionKey> {
    let node = graph.node(id)?;
    let weakest = node
        .neighbors()
        .filter(|other| Some(*other) != keep && graph.degree(other) > min)
        .filter_map(|other| graph.connection(id, other).map(|c| (other, c.weight)))
        .min_by(|x, y| x.1.partial_cmp(&y.1).unwrap_or(Ordering::Equal))
        .map(|(other, _)| other.to_string())?;

    graph.disconnect(id, &weakest);
    debug!("Shed connection {} <-> {}", id, weakest);
    Some(ConnectionKey::new(id, &weakest))
}
