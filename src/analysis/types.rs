//! Core data types for topology analysis.

use serde::{Deserialize, Serialize};

/// Sentinel for path metrics when no pair of nodes can reach each other
pub const UNREACHABLE: f64 = f64::INFINITY;

/// Whole-graph health metrics, recomputed from scratch after every change
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopologyMetrics {
    /// Composite of connectivity, load balance, resilience and path length
    pub efficiency: f64,
    /// Probability the graph stays connected under random node loss
    pub resilience: f64,
    /// Edge density
    pub connectivity: f64,
    pub load_balance: f64,
    /// Mean hop count over reachable pairs, or [`UNREACHABLE`]
    #[serde(with = "unreachable_as_null")]
    pub average_path_length: f64,
    /// Longest shortest path over reachable pairs, or [`UNREACHABLE`]
    #[serde(with = "unreachable_as_null")]
    pub network_diameter: f64,
    pub clustering_coefficient: f64,
}

/// JSON has no infinity: [`UNREACHABLE`] is written as `null` and read back
/// from it.
mod unreachable_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::UNREACHABLE;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(UNREACHABLE))
    }
}

impl TopologyMetrics {
    /// Metrics of a topology without nodes
    pub fn empty() -> Self {
        Self {
            efficiency: efficiency(0.0, 1.0, 1.0, 0.0),
            resilience: 1.0,
            connectivity: 0.0,
            load_balance: 1.0,
            average_path_length: 0.0,
            network_diameter: 0.0,
            clustering_coefficient: 0.0,
        }
    }

    /// True when at least one pair of nodes can reach each other, or the
    /// graph is too small to have pairs
    pub fn has_reachable_paths(&self) -> bool {
        self.average_path_length.is_finite()
    }
}

impl Default for TopologyMetrics {
    fn default() -> Self {
        Self::empty()
    }
}

/// Equal-weight composite score
pub fn efficiency(connectivity: f64, load_balance: f64, resilience: f64, average_path_length: f64) -> f64 {
    let path_term = 1.0 / average_path_length.max(1.0);
    (0.25 * connectivity + 0.25 * load_balance + 0.25 * resilience + 0.25 * path_term).clamp(0.0, 1.0)
}

/// Statistical summary of node degrees
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DegreeStats {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disconnected() -> TopologyMetrics {
        TopologyMetrics {
            efficiency: efficiency(0.0, 1.0, 0.0, UNREACHABLE),
            resilience: 0.0,
            connectivity: 0.0,
            average_path_length: UNREACHABLE,
            network_diameter: UNREACHABLE,
            ..TopologyMetrics::empty()
        }
    }

    #[test]
    fn test_unreachable_paths_survive_json() {
        let metrics = disconnected();
        let json = serde_json::to_string(&metrics).unwrap();
        assert!(json.contains("\"average_path_length\":null"));
        assert!(json.contains("\"network_diameter\":null"));

        let parsed: TopologyMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, metrics);
        assert!(!parsed.has_reachable_paths());
    }

    #[test]
    fn test_finite_paths_stay_numbers() {
        let metrics = TopologyMetrics {
            average_path_length: 1.5,
            network_diameter: 3.0,
            ..TopologyMetrics::empty()
        };
        let json = serde_json::to_string(&metrics).unwrap();
        assert!(json.contains("\"network_diameter\":3.0"));
        assert_eq!(serde_json::from_str::<TopologyMetrics>(&json).unwrap(), metrics);
    }

    #[test]
    fn test_unreachable_paths_survive_yaml() {
        let metrics = disconnected();
        let yaml = serde_yaml::to_string(&metrics).unwrap();
        let parsed: TopologyMetrics = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.network_diameter, UNREACHABLE);
    }
}
