//! Scripted sequences of topology changes.
//!
//! A scenario is a YAML list of steps replayed against a
//! [`TopologyManager`]. The CLI uses it to drive the manager without an
//! external orchestrator.
//!
//! ```yaml
//! name: coordinator failover
//! steps:
//!   - action: add
//!     agent: { id: c1, type: coordinator, capabilities: [plan] }
//!   - action: add
//!     agent: { id: w1, type: worker, load: 0.4 }
//!   - action: fail
//!     id: c1
//!   - action: optimize
//! ```

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentId};
use crate::analysis::TopologyMetrics;
use crate::history::PerformanceSample;
use crate::manager::{OptimizationOutcome, TopologyInfo, TopologyManager};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub steps: Vec<ScenarioStep>,
}

/// One scripted change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioStep {
    Add { agent: Agent },
    Remove { id: AgentId },
    Fail { id: AgentId },
    Update { agent: Agent },
    Activity { a: AgentId, b: AgentId },
    Optimize,
    /// Append the current metrics to the performance history
    Sample,
}

impl ScenarioStep {
    pub fn action(&self) -> &'static str {
        match self {
            ScenarioStep::Add { .. } => "add",
            ScenarioStep::Remove { .. } => "remove",
            ScenarioStep::Fail { .. } => "fail",
            ScenarioStep::Update { .. } => "update",
            ScenarioStep::Activity { .. } => "activity",
            ScenarioStep::Optimize => "optimize",
            ScenarioStep::Sample => "sample",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub action: String,
    pub applied: bool,
    pub message: String,
    pub efficiency: f64,
}

/// Everything the CLI writes after replaying a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: Option<String>,
    pub steps: Vec<StepOutcome>,
    pub topology: TopologyInfo,
    pub metrics: TopologyMetrics,
    pub history: Vec<PerformanceSample>,
}

/// Replay every step in order. Rejected steps are recorded and skipped.
pub fn run_scenario(manager: &TopologyManager, scenario: &Scenario) -> ScenarioReport {
    info!(
        "Running scenario '{}' ({} steps)",
        scenario.name.as_deref().unwrap_or("unnamed"),
        scenario.steps.len()
    );

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let (applied, message) = apply_step(manager, step);
        if !applied {
            warn!("Step {} ({}) not applied: {}", index, step.action(), message);
        }
        steps.push(StepOutcome {
            index,
            action: step.action().to_string(),
            applied,
            message,
            efficiency: manager.metrics().efficiency,
        });
    }

    manager.record_sample();

    ScenarioReport {
        name: scenario.name.clone(),
        steps,
        topology: manager.topology_info(),
        metrics: manager.metrics(),
        history: manager.performance_history(),
    }
}

fn apply_step(manager: &TopologyManager, step: &ScenarioStep) -> (bool, String) {
    match step {
        ScenarioStep::Add { agent } => match manager.add_agent(agent.clone()) {
            Ok(connected) => (true, format!("connected to {}", connected.join(", "))),
            Err(e) => (false, e.to_string()),
        },
        ScenarioStep::Remove { id } => {
            let removed = manager.remove_agent(id);
            (removed, status(removed, "removed", id))
        }
        ScenarioStep::Fail { id } => {
            let failed = manager.handle_agent_failure(id);
            (failed, status(failed, "marked failed", id))
        }
        ScenarioStep::Update { agent } => match manager.update_agent(agent.clone()) {
            Ok(()) => (true, format!("updated '{}'", agent.id)),
            Err(e) => (false, e.to_string()),
        },
        ScenarioStep::Activity { a, b } => {
            let recorded = manager.record_activity(a, b);
            (recorded, status(recorded, "activity recorded on", &format!("{}<->{}", a, b)))
        }
        ScenarioStep::Optimize => match manager.force_optimization() {
            OptimizationOutcome::Completed(report) => (
                true,
                format!(
                    "{} -> {} (pruned {}, extended {}, rebalanced {}, shed {})",
                    report.previous_type,
                    report.topology_type,
                    report.pruned,
                    report.extended,
                    report.rebalanced,
                    report.shed
                ),
            ),
            OptimizationOutcome::Skipped => (false, "optimization already running".to_string()),
        },
        ScenarioStep::Sample => {
            manager.record_sample();
            (true, "sample recorded".to_string())
        }
    }
}

fn status(ok: bool, verb: &str, subject: &str) -> String {
    if ok {
        format!("{} '{}'", verb, subject)
    } else {
        format!("unknown '{}'", subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentType;
    use crate::config::TopologyConfig;
    use crate::topology::TopologyType;

    const SCENARIO: &str = r#"
name: star
steps:
  - action: add
    agent: { id: c, type: coordinator }
  - action: add
    agent: { id: w1, type: worker, performance: { success_rate: 1.0 } }
  - action: add
    agent: { id: w2, type: worker }
  - action: remove
    id: ghost
  - action: sample
"#;

    #[test]
    fn test_parse_steps() {
        let scenario: Scenario = serde_yaml::from_str(SCENARIO).unwrap();
        assert_eq!(scenario.name.as_deref(), Some("star"));
        assert_eq!(scenario.steps.len(), 5);
        match &scenario.steps[1] {
            ScenarioStep::Add { agent } => {
                assert_eq!(agent.agent_type, AgentType::Worker);
                assert_eq!(agent.performance.throughput, 1.0);
            }
            other => panic!("unexpected step {:?}", other),
        }
        assert_eq!(scenario.steps[3], ScenarioStep::Remove { id: "ghost".to_string() });
        assert_eq!(scenario.steps[4], ScenarioStep::Sample);
    }

    #[test]
    fn test_run_star_scenario() {
        let config = TopologyConfig {
            topology_type: TopologyType::Star,
            min_connections: 1,
            max_connections: 2,
            seed: Some(1),
            ..Default::default()
        };
        let manager = TopologyManager::new(config).unwrap();
        let scenario: Scenario = serde_yaml::from_str(SCENARIO).unwrap();

        let report = run_scenario(&manager, &scenario);
        let applied: Vec<bool> = report.steps.iter().map(|s| s.applied).collect();
        assert_eq!(applied, vec![true, true, true, false, true]);
        assert_eq!(report.topology.connection_count, 2);
        assert_eq!(report.history.len(), 2);
        assert!((report.metrics.connectivity - 2.0 / 3.0).abs() < 1e-9);
    }
}
