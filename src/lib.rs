//! # Agentmesh - Adaptive topology manager for multi-agent systems
//!
//! This library maintains the connectivity graph between cooperating agents
//! and keeps reshaping it as agents join, leave and fail.
//!
//! ## Overview
//!
//! An orchestrator reports membership changes to a [`TopologyManager`]. The
//! manager connects new agents to their best-scoring peers, repairs the graph
//! when agents disappear, recomputes structural metrics after every change
//! and, when those metrics degrade, runs an optimization pass that may
//! migrate the whole graph to a different layout family.
//!
//! ## Key Features
//!
//! - **Seven layout families**: Mesh, Hierarchical, Ring, Star, Small-world, Scale-free, Hybrid
//! - **Pairwise scoring**: Capability overlap, load and reliability similarity, role compatibility
//! - **Metrics**: Path lengths, clustering, centrality, Monte-Carlo resilience, load balance
//! - **Self-healing**: Former neighbours of removed agents are topped back up
//! - **Closed-loop optimization**: Pluggable strategies behind a single-flight guard
//! - **Reproducible**: All randomness flows from one seedable generator
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `agent`: Agent descriptions and validation
//! - `topology`: Connectivity graph, scorer, candidate selection and layout builders
//! - `analysis`: Metrics engine
//! - `healing`: Repair after removal and failure
//! - `optimizer`: Optimization strategies and the target-layout decision
//! - `manager`: The thread-safe orchestrator-facing manager
//! - `events`: Change notifications and sinks
//! - `history`: Performance history and the periodic sampler
//! - `config` / `config_loader`: Configuration structures and YAML loading
//! - `scenario`: Scripted change sequences used by the CLI
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agentmesh::{Agent, AgentType, LogSink, TopologyConfig, TopologyManager};
//!
//! let manager = TopologyManager::new(TopologyConfig::default())?
//!     .with_sink(Arc::new(LogSink));
//!
//! manager.add_agent(Agent::new("planner", AgentType::Coordinator).with_capabilities(["plan"]))?;
//! manager.add_agent(Agent::new("worker-1", AgentType::Worker).with_load(0.4))?;
//! manager.handle_agent_failure("worker-1");
//!
//! println!("{:?}", manager.metrics());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! type: hybrid            # mesh/hierarchical/ring/star/small-world/scale-free/hybrid
//! max_nodes: 100
//! min_connections: 2
//! max_connections: 8
//! rebalance_threshold: 0.2
//! healing_enabled: true
//! adaptation_rate: 0.1
//! target_efficiency: 0.8
//! seed: 7
//! sampling_interval: "30s"
//! inactivity_timeout: "5m"
//! ```
//!
//! ## Error Handling
//!
//! Manager operations return [`TopologyError`] for rejected input; unknown
//! ids and unreachable targets are logged and absorbed. The configuration
//! loader and the binary use `color_eyre` for error reporting with context.

pub mod agent;
pub mod analysis;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod events;
pub mod healing;
pub mod history;
pub mod manager;
pub mod optimizer;
pub mod scenario;
pub mod topology;

pub use agent::{Agent, AgentId, AgentType, Location, Performance};
pub use analysis::{DegreeStats, TopologyMetrics};
pub use config::{TopologyConfig, ValidationError};
pub use error::TopologyError;
pub use events::{ChangeSink, ChangeType, JsonLinesSink, LogSink, MemorySink, SinkError, TopologyEvent};
pub use history::{MetricsSampler, PerformanceHistory, PerformanceSample, SamplerHandle};
pub use manager::{AgentInfo, OptimizationOutcome, TopologyInfo, TopologyManager, TopologySnapshot};
pub use optimizer::{OptimizationContext, OptimizationReport, OptimizationStrategy, StrategyKind};
pub use topology::{TopologyGraph, TopologyType};
