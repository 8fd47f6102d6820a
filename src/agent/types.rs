//! Agent type definitions.
//!
//! An [`Agent`] is the value the orchestrator hands to the manager. The graph
//! algorithms read it but never change it; the only in-place edit the manager
//! performs on its own is forcing `success_rate` to zero on failure.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TopologyError;

/// Unique identifier of an agent (and of the node wrapping it)
pub type AgentId = String;

/// Role an agent plays in the collective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// Routes work and anchors hierarchical layouts
    Coordinator,
    /// General purpose executor
    Worker,
    /// Executor with a narrow capability set
    Specialist,
    /// Links otherwise separate groups
    Bridge,
}

impl AgentType {
    /// Returns a string representation of the agent type
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Coordinator => "coordinator",
            AgentType::Worker => "worker",
            AgentType::Specialist => "specialist",
            AgentType::Bridge => "bridge",
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed performance of an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Performance {
    /// Mean response time in milliseconds
    pub response_time: f64,
    /// Fraction of successfully completed tasks, in [0, 1]
    pub success_rate: f64,
    /// Tasks per second
    pub throughput: f64,
}

impl Default for Performance {
    fn default() -> Self {
        Self {
            response_time: 100.0,
            success_rate: 1.0,
            throughput: 1.0,
        }
    }
}

/// Where an agent runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub region: String,
    /// Latency to the region's gateway in milliseconds
    pub latency: f64,
}

/// A participant whose connectivity is managed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Current utilisation, in [0, 1]
    #[serde(default)]
    pub load: f64,
    #[serde(default)]
    pub performance: Performance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default = "Utc::now")]
    pub last_seen: DateTime<Utc>,
}

impl Agent {
    /// Creates an idle agent with default performance and no capabilities
    pub fn new(id: impl Into<AgentId>, agent_type: AgentType) -> Self {
        Self {
            id: id.into(),
            agent_type,
            capabilities: BTreeSet::new(),
            load: 0.0,
            performance: Performance::default(),
            location: None,
            last_seen: Utc::now(),
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_load(mut self, load: f64) -> Self {
        self.load = load;
        self
    }

    pub fn with_performance(mut self, performance: Performance) -> Self {
        self.performance = performance;
        self
    }

    pub fn with_success_rate(mut self, success_rate: f64) -> Self {
        self.performance.success_rate = success_rate;
        self
    }

    pub fn with_throughput(mut self, throughput: f64) -> Self {
        self.performance.throughput = throughput;
        self
    }

    pub fn with_location(mut self, region: impl Into<String>, latency: f64) -> Self {
        self.location = Some(Location {
            region: region.into(),
            latency,
        });
        self
    }

    pub fn is_coordinator(&self) -> bool {
        self.agent_type == AgentType::Coordinator
    }

    /// Check that every numeric field lies in its documented range
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.id.trim().is_empty() {
            return Err(TopologyError::InvalidAgent {
                id: self.id.clone(),
                reason: "id cannot be empty".to_string(),
            });
        }

        let unit_fields = [
            ("load", self.load),
            ("success_rate", self.performance.success_rate),
        ];
        for (name, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(TopologyError::InvalidAgent {
                    id: self.id.clone(),
                    reason: format!("{} must be within [0, 1], got {}", name, value),
                });
            }
        }

        let non_negative = [
            ("response_time", self.performance.response_time),
            ("throughput", self.performance.throughput),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(TopologyError::InvalidAgent {
                    id: self.id.clone(),
                    reason: format!("{} must be a non-negative number, got {}", name, value),
                });
            }
        }

        if let Some(location) = &self.location {
            if !location.latency.is_finite() || location.latency < 0.0 {
                return Err(TopologyError::InvalidAgent {
                    id: self.id.clone(),
                    reason: format!("location latency must be non-negative, got {}", location.latency),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_yaml_parsing() {
        let yaml = r#"
id: "planner-1"
type: coordinator
capabilities: ["plan", "route"]
load: 0.4
performance:
  response_time: 12.5
  success_rate: 0.98
  throughput: 40
location:
  region: "eu-west"
  latency: 8
"#;
        let agent: Agent = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(agent.agent_type, AgentType::Coordinator);
        assert!(agent.capabilities.contains("route"));
        assert_eq!(agent.location.as_ref().unwrap().region, "eu-west");
        assert!(agent.validate().is_ok());
    }

    #[test]
    fn test_minimal_agent_defaults() {
        let agent: Agent = serde_yaml::from_str("id: w1\ntype: worker\n").unwrap();
        assert_eq!(agent.load, 0.0);
        assert_eq!(agent.performance.success_rate, 1.0);
        assert!(agent.capabilities.is_empty());
        assert!(agent.location.is_none());
    }

    #[test]
    fn test_validation_rejects_out_of_range_fields() {
        assert!(Agent::new("a", AgentType::Worker).with_load(1.5).validate().is_err());
        assert!(Agent::new("a", AgentType::Worker).with_load(f64::NAN).validate().is_err());
        assert!(Agent::new("a", AgentType::Worker).with_success_rate(-0.1).validate().is_err());
        assert!(Agent::new("a", AgentType::Worker).with_throughput(-1.0).validate().is_err());
        assert!(Agent::new("", AgentType::Worker).validate().is_err());
        assert!(Agent::new("a", AgentType::Bridge).with_load(1.0).validate().is_ok());
    }
}
