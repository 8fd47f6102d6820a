//! Pairwise connection desirability.
//!
//! Every builder that ranks candidates, incremental candidate selection and
//! healing all go through [`score`], so a change here reshapes every layout.

use crate::agent::{Agent, AgentType};

const CAPABILITY_WEIGHT: f64 = 0.3;
const LOAD_WEIGHT: f64 = 0.3;
const RELIABILITY_WEIGHT: f64 = 0.2;
const TYPE_WEIGHT: f64 = 0.2;

/// Desirability of connecting `a` and `b`, in [0, 1]
pub fn score(a: &Agent, b: &Agent) -> f64 {
    let capability = capability_overlap(a, b);
    let load = 1.0 - (a.load - b.load).abs();
    let reliability = 1.0 - (a.performance.success_rate - b.performance.success_rate).abs();
    let compatibility = type_compatibility(a.agent_type, b.agent_type);

    let total = CAPABILITY_WEIGHT * capability
        + LOAD_WEIGHT * load
        + RELIABILITY_WEIGHT * reliability
        + TYPE_WEIGHT * compatibility;

    if total.is_nan() {
        return 0.0;
    }
    total.clamp(0.0, 1.0)
}

/// Jaccard similarity of the two capability sets; 0 when both are empty
pub fn capability_overlap(a: &Agent, b: &Agent) -> f64 {
    let union = a.capabilities.union(&b.capabilities).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.capabilities.intersection(&b.capabilities).count();
    intersection as f64 / union as f64
}

/// Fixed affinity table between agent roles
pub fn type_compatibility(a: AgentType, b: AgentType) -> f64 {
    use AgentType::*;

    // Symmetric: normalise the pair so each combination appears once
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    match (first, second) {
        (Coordinator, Coordinator) => 0.7,
        (Coordinator, Worker) => 0.8,
        (Coordinator, Specialist) => 0.8,
        (Coordinator, Bridge) => 0.9,
        (Worker, Worker) => 0.6,
        (Worker, Specialist) => 0.7,
        (Worker, Bridge) => 0.7,
        (Specialist, Specialist) => 0.9,
        (Specialist, Bridge) => 0.7,
        (Bridge, Bridge) => 0.6,
        // Only reachable if the role set grows
        _ => 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPES: [AgentType; 4] = [
        AgentType::Coordinator,
        AgentType::Worker,
        AgentType::Specialist,
        AgentType::Bridge,
    ];

    #[test]
    fn test_score_bounds_for_all_type_pairs() {
        let loads = [0.0, 0.5, 1.0];
        let rates = [0.0, 1.0];
        let caps: [&[&str]; 3] = [&[], &["a"], &["a", "b", "c"]];

        for &ta in &TYPES {
            for &tb in &TYPES {
                for &la in &loads {
                    for &rb in &rates {
                        for ca in caps {
                            let a = Agent::new("a", ta).with_load(la).with_capabilities(ca.iter().copied());
                            let b = Agent::new("b", tb).with_load(1.0 - la).with_success_rate(rb);
                            let s = score(&a, &b);
                            assert!((0.0..=1.0).contains(&s), "score {} out of range", s);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_zero_capability_agents() {
        let a = Agent::new("a", AgentType::Worker);
        let b = Agent::new("b", AgentType::Worker);
        assert_eq!(capability_overlap(&a, &b), 0.0);
        // 0 overlap, identical load and success rate, worker/worker affinity
        let expected = 0.3 + 0.2 + 0.2 * 0.6;
        assert!((score(&a, &b) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_capability_overlap_is_jaccard() {
        let a = Agent::new("a", AgentType::Worker).with_capabilities(["x", "y", "z"]);
        let b = Agent::new("b", AgentType::Worker).with_capabilities(["y", "z", "w"]);
        assert!((capability_overlap(&a, &b) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_type_compatibility_is_symmetric_and_bounded() {
        for &a in &TYPES {
            for &b in &TYPES {
                let value = type_compatibility(a, b);
                assert_eq!(value, type_compatibility(b, a));
                assert!((0.6..=0.9).contains(&value));
            }
        }
        assert_eq!(type_compatibility(AgentType::Coordinator, AgentType::Bridge), 0.9);
        assert_eq!(type_compatibility(AgentType::Specialist, AgentType::Specialist), 0.9);
    }

    #[test]
    fn test_coordinator_preferred_over_identical_worker() {
        let coordinator = Agent::new("c", AgentType::Coordinator).with_capabilities(["compute"]);
        let worker = Agent::new("w1", AgentType::Worker).with_capabilities(["compute"]);
        let newcomer = Agent::new("w2", AgentType::Worker).with_capabilities(["compute"]);
        assert!(score(&newcomer, &coordinator) > score(&newcomer, &worker));
    }
}
