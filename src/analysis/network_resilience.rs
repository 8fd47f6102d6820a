//! Network resilience analysis.
//!
//! Connected components and Monte-Carlo estimation of how likely the graph
//! is to stay in one piece when a fifth of its nodes disappear at random.

use rand::seq::index::sample;
use rand::Rng;

/// Independent removal trials per estimate
pub const RESILIENCE_TRIALS: usize = 10;

/// Find connected components using BFS.
///
/// Nodes flagged in `removed` are ignored, which makes this usable on the
/// subgraph induced by the surviving nodes.
pub fn connected_components(adjacency: &[Vec<usize>], removed: &[bool]) -> Vec<Vec<usize>> {
    let n = adjacency.len();
    let mut visited = vec![false; n];
    let mut components = Vec::new();

    for start in 0..n {
        if visited[start] || removed.get(start).copied().unwrap_or(false) {
            continue;
        }

        let mut component = Vec::new();
        let mut queue = vec![start];
        visited[start] = true;

        while let Some(node) = queue.pop() {
            component.push(node);
            for &neighbor in &adjacency[node] {
                if !visited[neighbor] && !removed.get(neighbor).copied().unwrap_or(false) {
                    visited[neighbor] = true;
                    queue.push(neighbor);
                }
            }
        }

        components.push(component);
    }

    components
}

/// Fraction of trials in which removing a random 20% of nodes (rounded down)
/// leaves the remainder as a single connected component
pub fn monte_carlo_resilience<R: Rng + ?Sized>(adjacency: &[Vec<usize>], trials: usize, rng: &mut R) -> f64 {
    let n = adjacency.len();
    if n <= 1 || trials == 0 {
        return 1.0;
    }

    let remove_count = n / 5;
    let mut survived = 0usize;

    for _ in 0..trials {
        let mut removed = vec![false; n];
        for index in sample(rng, n, remove_count).iter() {
            removed[index] = true;
        }
        if connected_components(adjacency, &removed).len() <= 1 {
            survived += 1;
        }
    }

    survived as f64 / trials as f64
}
