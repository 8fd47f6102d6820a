//! Whole-topology construction strategies.
//!
//! A migration between layout families never patches the existing edge set:
//! [`build_topology`] clears every connection and rebuilds from scratch.

use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::agent::{AgentId, AgentType};
use crate::topology::graph::TopologyGraph;
use crate::topology::types::TopologyType;

/// Upper bound on the small-world lattice degree
const SMALL_WORLD_MAX_K: usize = 6;
/// One in five nodes (rounded up) becomes a scale-free hub
const SCALE_FREE_HUB_DIVISOR: usize = 5;
const SCALE_FREE_HUB_LINKS: usize = 3;
/// Extra random edges in hybrid layouts, relative to the node count
const HYBRID_EXTRA_FRACTION: f64 = 0.3;

/// Replace the whole edge set with a fresh layout of the given family
pub fn build_topology<R: Rng + ?Sized>(
    graph: &mut TopologyGraph,
    topology: TopologyType,
    rewire_probability: f64,
    rng: &mut R,
    now: DateTime<Utc>,
) {
    graph.clear_connections();

    match topology {
        TopologyType::Mesh => build_mesh(graph, now),
        TopologyType::Hierarchical => build_hierarchical(graph, now),
        TopologyType::Ring => build_ring(graph, now),
        TopologyType::Star => build_star(graph, now),
        TopologyType::SmallWorld => build_small_world(graph, rewire_probability, rng, now),
        TopologyType::ScaleFree => build_scale_free(graph, now),
        TopologyType::Hybrid => build_hybrid(graph, rng, now),
    }

    info!(
        "Built {} topology: {} nodes, {} connections",
        topology,
        graph.node_count(),
        graph.connection_count()
    );
}

/// Connect every unordered pair once
pub fn build_mesh(graph: &mut TopologyGraph, now: DateTime<Utc>) {
    let ids = graph.ids().to_vec();
    for (i, a) in ids.iter().enumerate() {
        for b in &ids[i + 1..] {
            graph.connect(a, b, now);
        }
    }
}

/// Fully connect coordinators and attach every other node to its
/// least-loaded coordinator. Without coordinators the first node stands in.
pub fn build_hierarchical(graph: &mut TopologyGraph, now: DateTime<Utc>) {
    let mut coordinators: Vec<AgentId> = graph
        .agents()
        .filter(|agent| agent.agent_type == AgentType::Coordinator)
        .map(|agent| agent.id.clone())
        .collect();

    if coordinators.is_empty() {
        match graph.ids().first() {
            Some(first) => {
                debug!("No coordinators present, '{}' acts as one", first);
                coordinators.push(first.clone());
            }
            None => return,
        }
    }

    for (i, a) in coordinators.iter().enumerate() {
        for b in &coordinators[i + 1..] {
            graph.connect(a, b, now);
        }
        if let Some(node) = graph.node_mut(a) {
            node.cluster = Some(a.clone());
        }
    }

    let members: Vec<AgentId> = graph
        .ids()
        .iter()
        .filter(|id| !coordinators.contains(*id))
        .cloned()
        .collect();

    for member in members {
        let Some(coordinator) = least_loaded(graph, &coordinators) else {
            continue;
        };
        graph.connect(&member, &coordinator, now);
        if let Some(node) = graph.node_mut(&member) {
            node.cluster = Some(coordinator);
        }
    }
}

fn least_loaded(graph: &TopologyGraph, candidates: &[AgentId]) -> Option<AgentId> {
    candidates
        .iter()
        .filter_map(|id| graph.agent(id))
        .fold(None, |best: Option<(&str, f64)>, agent| match best {
            Some((_, load)) if load <= agent.load => best,
            _ => Some((agent.id.as_str(), agent.load)),
        })
        .map(|(id, _)| id.to_string())
}

/// Connect node i to node (i + 1) mod N, in insertion order
pub fn build_ring(graph: &mut TopologyGraph, now: DateTime<Utc>) {
    let ids = graph.ids().to_vec();
    let n = ids.len();
    if n < 2 {
        return;
    }
    for i in 0..n {
        graph.connect(&ids[i], &ids[(i + 1) % n], now);
    }
}

/// Hub of a star layout: the first coordinator, else the first node
pub fn star_hub(graph: &TopologyGraph) -> Option<AgentId> {
    graph
        .agents()
        .find(|agent| agent.agent_type == AgentType::Coordinator)
        .or_else(|| graph.agents().next())
        .map(|agent| agent.id.clone())
}

/// Connect the hub to every other node
pub fn build_star(graph: &mut TopologyGraph, now: DateTime<Utc>) {
    let Some(hub) = star_hub(graph) else {
        return;
    };
    let spokes: Vec<AgentId> = graph.ids().iter().filter(|id| **id != hub).cloned().collect();
    for spoke in spokes {
        graph.connect(&hub, &spoke, now);
    }
}

/// Ring lattice with k/2 neighbours per side, then random rewiring of each
/// edge with probability `rewire_probability`
pub fn build_small_world<R: Rng + ?Sized>(
    graph: &mut TopologyGraph,
    rewire_probability: f64,
    rng: &mut R,
    now: DateTime<Utc>,
) {
    let ids = graph.ids().to_vec();
    let n = ids.len();
    if n < 2 {
        return;
    }

    let k = SMALL_WORLD_MAX_K.min(n - 1);
    let half = (k / 2).max(1);
    for i in 0..n {
        for offset in 1..=half {
            graph.connect(&ids[i], &ids[(i + offset) % n], now);
        }
    }

    let p = rewire_probability.clamp(0.0, 1.0);
    let lattice: Vec<(AgentId, AgentId)> = graph
        .connections()
        .map(|(key, _)| {
            let (a, b) = key.endpoints();
            (a.to_string(), b.to_string())
        })
        .collect();

    let mut rewired = 0usize;
    for (a, b) in lattice {
        if !rng.gen_bool(p) {
            continue;
        }
        let targets: Vec<&AgentId> = ids
            .iter()
            .filter(|id| **id != a && **id != b && !graph.are_connected(&a, id))
            .collect();
        let Some(target) = targets.choose(rng).map(|id| (*id).clone()) else {
            continue;
        };
        graph.disconnect(&a, &b);
        graph.connect(&a, &target, now);
        rewired += 1;
    }
    debug!("Small-world lattice k={} rewired {} edges", k, rewired);
}

/// High-throughput hubs form a clique; every other node attaches to its
/// three best hubs by current degree plus throughput
pub fn build_scale_free(graph: &mut TopologyGraph, now: DateTime<Utc>) {
    let n = graph.node_count();
    if n == 0 {
        return;
    }

    let mut by_throughput: Vec<(AgentId, f64)> = graph
        .agents()
        .map(|agent| (agent.id.clone(), agent.performance.throughput))
        .collect();
    by_throughput.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let hub_count = ((n + SCALE_FREE_HUB_DIVISOR - 1) / SCALE_FREE_HUB_DIVISOR).clamp(1, n);
    let hubs: Vec<(AgentId, f64)> = by_throughput[..hub_count].to_vec();

    for (i, (a, _)) in hubs.iter().enumerate() {
        for (b, _) in &hubs[i + 1..] {
            graph.connect(a, b, now);
        }
    }

    for (member, _) in &by_throughput[hub_count..] {
        let mut ranked: Vec<(&AgentId, f64)> = hubs
            .iter()
            .map(|(hub, throughput)| (hub, graph.degree(hub) as f64 + throughput))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let chosen: Vec<AgentId> = ranked
            .into_iter()
            .take(SCALE_FREE_HUB_LINKS)
            .map(|(hub, _)| hub.clone())
            .collect();
        for hub in chosen {
            graph.connect(member, &hub, now);
        }
    }
}

/// Hierarchical backbone plus round(0.3 * N) random shortcuts between
/// unconnected pairs
pub fn build_hybrid<R: Rng + ?Sized>(graph: &mut TopologyGraph, rng: &mut R, now: DateTime<Utc>) {
    build_hierarchical(graph, now);

    let ids = graph.ids().to_vec();
    let extra = (ids.len() as f64 * HYBRID_EXTRA_FRACTION).round() as usize;
    if extra == 0 {
        return;
    }

    let mut open_pairs: Vec<(&AgentId, &AgentId)> = Vec::new();
    for (i, a) in ids.iter().enumerate() {
        for b in &ids[i + 1..] {
            if !graph.are_connected(a, b) {
                open_pairs.push((a, b));
            }
        }
    }

    let shortcuts: Vec<(AgentId, AgentId)> = open_pairs
        .choose_multiple(rng, extra)
        .map(|(a, b)| ((*a).clone(), (*b).clone()))
        .collect();
    for (a, b) in shortcuts {
        graph.connect(&a, &b, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn graph_of(types: &[AgentType]) -> TopologyGraph {
        let mut graph = TopologyGraph::new();
        for (i, agent_type) in types.iter().enumerate() {
            graph.add_node(
                Agent::new(format!("n{:02}", i), *agent_type)
                    .with_load((i % 5) as f64 / 5.0)
                    .with_throughput(i as f64),
            );
        }
        graph
    }

    fn workers(n: usize) -> TopologyGraph {
        graph_of(&vec![AgentType::Worker; n])
    }

    #[test]
    fn test_mesh_edge_count() {
        for n in [0, 1, 2, 5, 9] {
            let mut graph = workers(n);
            build_mesh(&mut graph, Utc::now());
            assert_eq!(graph.connection_count(), n * n.saturating_sub(1) / 2);
        }
    }

    #[test]
    fn test_ring_degrees() {
        for n in [3, 4, 10] {
            let mut graph = workers(n);
            build_ring(&mut graph, Utc::now());
            assert_eq!(graph.connection_count(), n);
            assert!(graph.ids().iter().all(|id| graph.degree(id) == 2));
        }
    }

    #[test]
    fn test_star_uses_first_coordinator_as_hub() {
        let mut graph = graph_of(&[
            AgentType::Worker,
            AgentType::Coordinator,
            AgentType::Worker,
            AgentType::Coordinator,
        ]);
        build_star(&mut graph, Utc::now());
        assert_eq!(graph.connection_count(), 3);
        assert!(graph.connections().all(|(key, _)| key.contains("n01")));
        assert_eq!(graph.degree("n01"), 3);
    }

    #[test]
    fn test_star_without_coordinator() {
        let mut graph = workers(5);
        build_star(&mut graph, Utc::now());
        assert_eq!(graph.connection_count(), 4);
        assert_eq!(graph.degree("n00"), 4);
    }

    #[test]
    fn test_hierarchical_structure() {
        let mut graph = graph_of(&[
            AgentType::Coordinator,
            AgentType::Coordinator,
            AgentType::Worker,
            AgentType::Specialist,
            AgentType::Bridge,
        ]);
        build_hierarchical(&mut graph, Utc::now());

        // 1 coordinator link + 3 member links
        assert_eq!(graph.connection_count(), 4);
        assert!(graph.are_connected("n00", "n01"));
        // n00 has load 0.0, the lower of the two coordinators
        for member in ["n02", "n03", "n04"] {
            assert!(graph.are_connected(member, "n00"));
            assert_eq!(graph.node(member).unwrap().cluster.as_deref(), Some("n00"));
        }
    }

    #[test]
    fn test_small_world_lattice_without_rewiring() {
        let mut graph = workers(10);
        let mut rng = StdRng::seed_from_u64(3);
        build_small_world(&mut graph, 0.0, &mut rng, Utc::now());
        // k = 6, three neighbours per side
        assert_eq!(graph.connection_count(), 30);
        assert!(graph.ids().iter().all(|id| graph.degree(id) == 6));
    }

    #[test]
    fn test_small_world_rewiring_keeps_edge_count() {
        let mut graph = workers(20);
        let mut rng = StdRng::seed_from_u64(11);
        build_small_world(&mut graph, 0.5, &mut rng, Utc::now());
        assert_eq!(graph.connection_count(), 60);
    }

    #[test]
    fn test_scale_free_hubs() {
        let mut graph = workers(10);
        build_scale_free(&mut graph, Utc::now());
        // Hubs are the two highest-throughput nodes: n09 and n08
        assert!(graph.are_connected("n09", "n08"));
        for i in 0..8 {
            let id = format!("n{:02}", i);
            assert_eq!(graph.degree(&id), 2, "{} should attach to both hubs", id);
        }
        assert_eq!(graph.connection_count(), 1 + 8 * 2);
    }

    #[test]
    fn test_hybrid_adds_shortcuts() {
        let mut graph = graph_of(&[
            AgentType::Coordinator,
            AgentType::Worker,
            AgentType::Worker,
            AgentType::Worker,
            AgentType::Worker,
            AgentType::Worker,
            AgentType::Worker,
            AgentType::Worker,
            AgentType::Worker,
            AgentType::Worker,
        ]);
        let mut rng = StdRng::seed_from_u64(5);
        build_hybrid(&mut graph, &mut rng, Utc::now());
        // 9 spokes + round(3.0) shortcuts
        assert_eq!(graph.connection_count(), 12);
    }

    #[test]
    fn test_rebuild_replaces_edges() {
        let mut graph = workers(6);
        let mut rng = StdRng::seed_from_u64(1);
        build_topology(&mut graph, TopologyType::Mesh, 0.1, &mut rng, Utc::now());
        assert_eq!(graph.connection_count(), 15);
        build_topology(&mut graph, TopologyType::Ring, 0.1, &mut rng, Utc::now());
        assert_eq!(graph.connection_count(), 6);
    }
}
