//! Network graph analysis module.
//!
//! Provides the structural measurements of the connectivity graph:
//! - Breadth-first shortest-path trees from every node
//! - Average path length and diameter
//! - Edge density and clustering coefficient
//! - Degree distribution statistics
//! - GraphViz DOT output for visualization

use std::collections::HashSet;

use rayon::prelude::*;

use super::metrics::std_dev;
use super::types::{DegreeStats, UNREACHABLE};
use crate::agent::AgentType;
use crate::topology::{AdjacencyIndex, TopologyGraph, TopologyType};

/// Unweighted shortest-path tree rooted at one node
#[derive(Debug, Clone)]
pub struct BfsTree {
    pub source: usize,
    /// Hop count to every node, `None` when unreachable
    pub distance: Vec<Option<usize>>,
    /// First node through which each node was discovered
    pub parent: Vec<Option<usize>>,
}

/// Breadth-first search from `source`
pub fn bfs(adjacency: &[Vec<usize>], source: usize) -> BfsTree {
    let n = adjacency.len();
    let mut distance = vec![None; n];
    let mut parent = vec![None; n];
    let mut queue = std::collections::VecDeque::new();

    distance[source] = Some(0);
    queue.push_back(source);

    while let Some(node) = queue.pop_front() {
        let next = distance[node].unwrap_or(0) + 1;
        for &neighbor in &adjacency[node] {
            if distance[neighbor].is_none() {
                distance[neighbor] = Some(next);
                parent[neighbor] = Some(node);
                queue.push_back(neighbor);
            }
        }
    }

    BfsTree {
        source,
        distance,
        parent,
    }
}

/// One BFS tree per node, computed in parallel and returned in node order
pub fn all_pairs_bfs(index: &AdjacencyIndex) -> Vec<BfsTree> {
    (0..index.len())
        .into_par_iter()
        .map(|source| bfs(&index.adjacency, source))
        .collect()
}

/// Average path length and diameter over reachable pairs.
///
/// Graphs with fewer than two nodes report zero for both; graphs where no
/// pair is reachable report [`UNREACHABLE`] for both.
pub fn path_statistics(trees: &[BfsTree]) -> (f64, f64) {
    if trees.len() < 2 {
        return (0.0, 0.0);
    }

    let mut total = 0usize;
    let mut pairs = 0usize;
    let mut diameter = 0usize;

    for tree in trees {
        for (target, distance) in tree.distance.iter().enumerate() {
            if target == tree.source {
                continue;
            }
            if let Some(hops) = distance {
                total += hops;
                pairs += 1;
                diameter = diameter.max(*hops);
            }
        }
    }

    if pairs == 0 {
        return (UNREACHABLE, UNREACHABLE);
    }
    (total as f64 / pairs as f64, diameter as f64)
}

/// Edge count relative to the complete graph; 0 for one node or fewer
pub fn connectivity(node_count: usize, connection_count: usize) -> f64 {
    if node_count <= 1 {
        return 0.0;
    }
    let possible = node_count * (node_count - 1) / 2;
    (connection_count as f64 / possible as f64).min(1.0)
}

/// Mean local clustering over nodes with at least two neighbours
pub fn clustering_coefficient(adjacency: &[Vec<usize>]) -> f64 {
    let neighbor_sets: Vec<HashSet<usize>> = adjacency
        .iter()
        .map(|neighbors| neighbors.iter().copied().collect())
        .collect();

    let mut sum = 0.0;
    let mut qualifying = 0usize;

    for neighbors in adjacency {
        let k = neighbors.len();
        if k < 2 {
            continue;
        }

        let mut closed = 0usize;
        for i in 0..k {
            for j in (i + 1)..k {
                if neighbor_sets[neighbors[i]].contains(&neighbors[j]) {
                    closed += 1;
                }
            }
        }

        let possible = k * (k - 1) / 2;
        sum += closed as f64 / possible as f64;
        qualifying += 1;
    }

    if qualifying == 0 {
        0.0
    } else {
        sum / qualifying as f64
    }
}

/// Min, max, mean, median and spread of node degrees
pub fn degree_stats(graph: &TopologyGraph) -> DegreeStats {
    let mut degrees: Vec<usize> = graph.nodes().map(|node| node.degree()).collect();
    degrees.sort_unstable();
    let (Some(&min), Some(&max)) = (degrees.first(), degrees.last()) else {
        return DegreeStats::default();
    };

    let as_f64: Vec<f64> = degrees.iter().map(|&d| d as f64).collect();
    let mid = degrees.len() / 2;
    let median = if degrees.len() % 2 == 1 {
        as_f64[mid]
    } else {
        (as_f64[mid - 1] + as_f64[mid]) / 2.0
    };

    DegreeStats {
        min,
        max,
        mean: as_f64.iter().sum::<f64>() / as_f64.len() as f64,
        median,
        std_dev: std_dev(&as_f64),
    }
}

/// Generate GraphViz DOT format for visualization
pub fn generate_dot(graph: &TopologyGraph, topology: TopologyType) -> String {
    let mut dot = String::new();
    dot.push_str("graph AgentTopology {\n");
    dot.push_str("    layout=neato;\n");
    dot.push_str("    node [shape=circle];\n");
    dot.push_str(&format!("    label=\"{} topology\";\n", topology));
    dot.push_str("    labelloc=t;\n\n");

    for node in graph.nodes() {
        let color = if node.degraded {
            "red"
        } else {
            match node.agent.agent_type {
                AgentType::Coordinator => "gold",
                AgentType::Bridge => "palegreen",
                AgentType::Specialist => "plum",
                AgentType::Worker => "lightblue",
            }
        };

        dot.push_str(&format!(
            "    \"{}\" [label=\"{}\\n{:.0}%\", fillcolor={}, style=filled];\n",
            node.id(),
            node.id(),
            node.agent.load * 100.0,
            color
        ));
    }

    dot.push('\n');

    for (key, connection) in graph.connections() {
        let (a, b) = key.endpoints();
        dot.push_str(&format!(
            "    \"{}\" -- \"{}\" [penwidth={:.2}];\n",
            a,
            b,
            0.5 + 2.5 * connection.weight
        ));
    }

    dot.push_str("}\n");
    dot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(n: usize) -> Vec<Vec<usize>> {
        (0..n)
            .map(|i| {
                let mut neighbors = Vec::new();
                if i > 0 {
                    neighbors.push(i - 1);
                }
                if i + 1 < n {
                    neighbors.push(i + 1);
                }
                neighbors
            })
            .collect()
    }

    fn trees(adjacency: Vec<Vec<usize>>) -> Vec<BfsTree> {
        let index = AdjacencyIndex {
            ids: (0..adjacency.len()).map(|i| i.to_string()).collect(),
            adjacency,
        };
        all_pairs_bfs(&index)
    }

    #[test]
    fn test_bfs_distances_on_path() {
        let tree = bfs(&path(4), 0);
        assert_eq!(tree.distance, vec![Some(0), Some(1), Some(2), Some(3)]);
        assert_eq!(tree.parent, vec![None, Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn test_path_statistics() {
        // Path of 3: pairs at distance 1, 1, 2
        let (average, diameter) = path_statistics(&trees(path(3)));
        assert!((average - 4.0 / 3.0).abs() < 1e-9);
        assert_eq!(diameter, 2.0);
    }

    #[test]
    fn test_path_statistics_edge_cases() {
        assert_eq!(path_statistics(&[]), (0.0, 0.0));
        assert_eq!(path_statistics(&trees(vec![vec![]])), (0.0, 0.0));

        let (average, diameter) = path_statistics(&trees(vec![vec![], vec![], vec![]]));
        assert!(average.is_infinite());
        assert!(diameter.is_infinite());

        // Two components: only the reachable pair counts
        let (average, diameter) = path_statistics(&trees(vec![vec![1], vec![0], vec![]]));
        assert_eq!(average, 1.0);
        assert_eq!(diameter, 1.0);
    }

    #[test]
    fn test_connectivity() {
        assert_eq!(connectivity(0, 0), 0.0);
        assert_eq!(connectivity(1, 0), 0.0);
        assert!((connectivity(3, 2) - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(connectivity(4, 6), 1.0);
    }

    #[test]
    fn test_clustering() {
        let triangle = vec![vec![1, 2], vec![0, 2], vec![0, 1]];
        assert_eq!(clustering_coefficient(&triangle), 1.0);
        assert_eq!(clustering_coefficient(&path(5)), 0.0);
        assert_eq!(clustering_coefficient(&[vec![1], vec![0]]), 0.0);

        // Triangle with a pendant on node 0: node 0 has 1 of 3 possible links
        let tailed = vec![vec![1, 2, 3], vec![0, 2], vec![0, 1], vec![0]];
        let expected = (1.0 / 3.0 + 1.0 + 1.0) / 3.0;
        assert!((clustering_coefficient(&tailed) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_degree_stats() {
        use crate::agent::Agent;
        use crate::topology::builders::build_star;
        use chrono::Utc;

        assert_eq!(degree_stats(&TopologyGraph::new()), DegreeStats::default());

        let mut graph = TopologyGraph::new();
        for i in 0..5 {
            graph.add_node(Agent::new(format!("n{}", i), AgentType::Worker));
        }
        build_star(&mut graph, Utc::now());

        // Degrees 4, 1, 1, 1, 1
        let stats = degree_stats(&graph);
        assert_eq!(stats.min, 1);
        assert_eq!(stats.max, 4);
        assert!((stats.mean - 1.6).abs() < 1e-9);
        assert_eq!(stats.median, 1.0);
        assert!((stats.std_dev - 1.2).abs() < 1e-9);
    }
}
