//! Node centrality measures.
//!
//! Betweenness follows exactly one shortest path per node pair (the one
//! recorded in the BFS parent tree). Pairs joined by several equal-length
//! paths therefore credit only one of them.

use super::network_graph::BfsTree;
use crate::topology::Centrality;

const POWER_ITERATIONS: usize = 100;

/// Degree, betweenness, closeness and eigenvector centrality for every node,
/// in adjacency order
pub fn compute_centrality(adjacency: &[Vec<usize>], trees: &[BfsTree]) -> Vec<Centrality> {
    let n = adjacency.len();
    if n == 0 {
        return Vec::new();
    }

    let degree = normalize_by_max(adjacency.iter().map(|neighbors| neighbors.len() as f64).collect());
    let betweenness = normalize_by_max(path_counts(trees, n));
    let closeness = closeness(trees);
    let eigenvector = eigenvector(adjacency);

    (0..n)
        .map(|i| Centrality {
            degree: degree[i],
            betweenness: betweenness[i],
            closeness: closeness.get(i).copied().unwrap_or(0.0),
            eigenvector: eigenvector[i],
        })
        .collect()
}

fn normalize_by_max(values: Vec<f64>) -> Vec<f64> {
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.into_iter().map(|v| v / max).collect()
}

/// How many pair paths pass through each node as an intermediate hop
fn path_counts(trees: &[BfsTree], n: usize) -> Vec<f64> {
    let mut counts = vec![0.0; n];

    for tree in trees {
        for target in (tree.source + 1)..n {
            if tree.distance[target].is_none() {
                continue;
            }
            let mut hop = tree.parent[target];
            while let Some(node) = hop {
                if node == tree.source {
                    break;
                }
                counts[node] += 1.0;
                hop = tree.parent[node];
            }
        }
    }

    counts
}

/// Reachable node count divided by total distance to them
fn closeness(trees: &[BfsTree]) -> Vec<f64> {
    trees
        .iter()
        .map(|tree| {
            let (reachable, total) = tree
                .distance
                .iter()
                .enumerate()
                .filter(|(target, _)| *target != tree.source)
                .filter_map(|(_, distance)| *distance)
                .fold((0usize, 0usize), |(count, sum), hops| (count + 1, sum + hops));
            if total == 0 {
                0.0
            } else {
                reachable as f64 / total as f64
            }
        })
        .collect()
}

/// Power iteration from a uniform vector, L2-normalized every round
fn eigenvector(adjacency: &[Vec<usize>]) -> Vec<f64> {
    let n = adjacency.len();
    let mut scores = vec![1.0 / (n as f64).sqrt(); n];

    for _ in 0..POWER_ITERATIONS {
        let next: Vec<f64> = adjacency
            .iter()
            .map(|neighbors| neighbors.iter().map(|&j| scores[j]).sum())
            .collect();

        let norm = next.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm <= f64::EPSILON {
            return vec![0.0; n];
        }
        scores = next.into_iter().map(|v| v / norm).collect();
    }

    scores.into_iter().map(|v| v.clamp(0.0, 1.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::network_graph::bfs;

    fn centrality_of(adjacency: Vec<Vec<usize>>) -> Vec<Centrality> {
        let trees: Vec<BfsTree> = (0..adjacency.len()).map(|s| bfs(&adjacency, s)).collect();
        compute_centrality(&adjacency, &trees)
    }

    fn star(n: usize) -> Vec<Vec<usize>> {
        let mut adjacency = vec![(1..n).collect::<Vec<_>>()];
        adjacency.extend((1..n).map(|_| vec![0]));
        adjacency
    }

    #[test]
    fn test_star_hub_dominates() {
        let scores = centrality_of(star(5));
        let hub = scores[0];
        assert_eq!(hub.degree, 1.0);
        assert_eq!(hub.betweenness, 1.0);
        assert_eq!(hub.closeness, 1.0);
        for leaf in &scores[1..] {
            assert_eq!(leaf.degree, 0.25);
            assert_eq!(leaf.betweenness, 0.0);
            // 1 hop to the hub, 2 hops to three leaves
            assert!((leaf.closeness - 4.0 / 7.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_all_scores_in_unit_range() {
        let adjacency = vec![vec![1, 2], vec![0, 2, 3], vec![0, 1], vec![1, 4], vec![3], vec![]];
        for c in centrality_of(adjacency) {
            for value in [c.degree, c.betweenness, c.closeness, c.eigenvector] {
                assert!((0.0..=1.0).contains(&value), "{} out of range", value);
            }
        }
    }

    #[test]
    fn test_single_path_betweenness_on_square() {
        // 0-1-3 and 0-2-3 tie; only the first discovered path is credited
        let square = vec![vec![1, 2], vec![0, 3], vec![0, 3], vec![1, 2]];
        let scores = centrality_of(square);
        let raw: Vec<f64> = scores.iter().map(|c| c.betweenness).collect();
        assert!(raw.iter().any(|&v| v == 1.0));
        assert!(raw[1] != raw[2] || raw[0] != raw[3]);
    }

    #[test]
    fn test_edgeless_graph() {
        let scores = centrality_of(vec![vec![], vec![], vec![]]);
        assert!(scores.iter().all(|c| *c == Centrality::default()));
    }

    #[test]
    fn test_eigenvector_symmetric_ring() {
        let ring: Vec<Vec<usize>> = (0..6).map(|i| vec![(i + 5) % 6, (i + 1) % 6]).collect();
        let scores = centrality_of(ring);
        let first = scores[0].eigenvector;
        assert!(first > 0.0);
        assert!(scores.iter().all(|c| (c.eigenvector - first).abs() < 1e-9));
    }
}
