//! Topology type definitions.
//!
//! This file contains the layout families the builders know how to produce
//! (Mesh, Hierarchical, Ring, Star, Small-world, Scale-free, Hybrid).

use serde::{Deserialize, Serialize};

/// Layout family of the connectivity graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopologyType {
    /// Every agent connects to every other agent
    Mesh,
    /// Coordinators form a clique, everyone else hangs off one coordinator
    Hierarchical,
    /// Each agent connects to its successor, wrapping around
    Ring,
    /// A single hub connects to every other agent
    Star,
    /// Ring lattice with random long-range rewiring
    SmallWorld,
    /// High-throughput hubs with preferential attachment
    ScaleFree,
    /// Hierarchical backbone plus random shortcuts
    Hybrid,
}

impl TopologyType {
    pub const ALL: [TopologyType; 7] = [
        TopologyType::Mesh,
        TopologyType::Hierarchical,
        TopologyType::Ring,
        TopologyType::Star,
        TopologyType::SmallWorld,
        TopologyType::ScaleFree,
        TopologyType::Hybrid,
    ];

    /// Returns the configuration name of this topology type
    pub fn as_str(&self) -> &'static str {
        match self {
            TopologyType::Mesh => "mesh",
            TopologyType::Hierarchical => "hierarchical",
            TopologyType::Ring => "ring",
            TopologyType::Star => "star",
            TopologyType::SmallWorld => "small-world",
            TopologyType::ScaleFree => "scale-free",
            TopologyType::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for TopologyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
