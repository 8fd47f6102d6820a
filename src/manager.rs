//! The topology manager.
//!
//! [`TopologyManager`] owns the graph, the configuration and the random
//! source. All mutations go through one `parking_lot::Mutex`; after each one
//! the metrics are recomputed, an automatic optimization pass may run, and a
//! fresh [`TopologySnapshot`] is published. Queries read the snapshot and
//! never wait on a mutation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agent::{Agent, AgentId};
use crate::analysis::{connected_components, degree_stats, generate_dot, refresh_metrics, DegreeStats, TopologyMetrics};
use crate::config::{TopologyConfig, ValidationError};
use crate::error::TopologyError;
use crate::events::{ChangeSink, ChangeType, SinkDispatcher, TopologyEvent};
use crate::healing::{heal_after_failure, heal_after_removal, mark_failed};
use crate::history::{PerformanceHistory, PerformanceSample};
use crate::optimizer::{should_optimize, OptimizationContext, OptimizationReport, OptimizationStrategy};
use crate::topology::{connect_with_room, optimal_connections, score, Centrality, SelectionLimits, TopologyGraph, TopologyType};

/// Immutable copy of the manager state after the latest change
#[derive(Debug, Clone)]
pub struct TopologySnapshot {
    pub graph: TopologyGraph,
    pub config: TopologyConfig,
    pub metrics: TopologyMetrics,
    pub taken_at: DateTime<Utc>,
}

/// Summary returned by [`TopologyManager::topology_info`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyInfo {
    #[serde(rename = "type")]
    pub topology_type: TopologyType,
    pub node_count: usize,
    pub connection_count: usize,
    pub components: usize,
    pub degree_stats: DegreeStats,
    pub optimization_passes: u64,
    pub config: TopologyConfig,
}

/// Per-agent view returned by [`TopologyManager::agent_info`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent: Agent,
    pub connection_count: usize,
    pub neighbors: Vec<AgentId>,
    pub centrality: Centrality,
    pub cluster: Option<AgentId>,
    pub degraded: bool,
}

/// Result of [`TopologyManager::force_optimization`]
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizationOutcome {
    Completed(OptimizationReport),
    /// Another pass was already running
    Skipped,
}

impl OptimizationOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, OptimizationOutcome::Completed(_))
    }
}

struct ManagerState {
    graph: TopologyGraph,
    config: TopologyConfig,
    metrics: TopologyMetrics,
    rng: StdRng,
}

/// Clears the single-flight flag when the pass ends
struct OptimizationGuard<'a>(&'a AtomicBool);

impl<'a> OptimizationGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for OptimizationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct TopologyManager {
    state: Mutex<ManagerState>,
    snapshot: RwLock<Arc<TopologySnapshot>>,
    strategy: Box<dyn OptimizationStrategy>,
    is_optimizing: AtomicBool,
    optimization_passes: AtomicU64,
    history: Mutex<PerformanceHistory>,
    dispatcher: SinkDispatcher,
}

impl TopologyManager {
    /// Create a manager using the strategy named in the configuration
    pub fn new(config: TopologyConfig) -> Result<Self, ValidationError> {
        let strategy = config.strategy.build();
        Self::with_strategy(config, strategy)
    }

    /// Create a manager driven by a caller-supplied strategy
    pub fn with_strategy(
        config: TopologyConfig,
        strategy: Box<dyn OptimizationStrategy>,
    ) -> Result<Self, ValidationError> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let metrics = TopologyMetrics::empty();
        let graph = TopologyGraph::new();
        let snapshot = TopologySnapshot {
            graph: graph.clone(),
            config: config.clone(),
            metrics,
            taken_at: Utc::now(),
        };

        info!(
            "Topology manager ready: {} layout, up to {} agents, {}..={} connections, {} strategy",
            config.topology_type,
            config.max_nodes,
            config.min_connections,
            config.max_connections,
            strategy.kind().as_str()
        );

        Ok(Self {
            history: Mutex::new(PerformanceHistory::new(config.history_capacity)),
            state: Mutex::new(ManagerState {
                graph,
                config,
                metrics,
                rng,
            }),
            snapshot: RwLock::new(Arc::new(snapshot)),
            strategy,
            is_optimizing: AtomicBool::new(false),
            optimization_passes: AtomicU64::new(0),
            dispatcher: SinkDispatcher::spawn(),
        })
    }

    /// Register a change sink
    pub fn with_sink(self, sink: Arc<dyn ChangeSink>) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn add_sink(&self, sink: Arc<dyn ChangeSink>) {
        self.dispatcher.add_sink(sink);
    }

    /// Register an agent and connect it to its best candidates.
    ///
    /// Returns the ids it was connected to.
    pub fn add_agent(&self, agent: Agent) -> Result<Vec<AgentId>, TopologyError> {
        agent.validate()?;

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.graph.node_count() >= state.config.max_nodes {
            return Err(TopologyError::CapacityExceeded {
                id: agent.id,
                max_nodes: state.config.max_nodes,
            });
        }
        if state.graph.contains(&agent.id) {
            return Err(TopologyError::DuplicateAgent(agent.id));
        }

        let id = agent.id.clone();
        let agent_type = agent.agent_type;
        state.graph.add_node(agent);

        let selection = limits(&state.config);
        let candidates = optimal_connections(
            &state.graph,
            &id,
            state.config.topology_type,
            selection,
            &HashSet::new(),
            &mut state.rng,
        );
        let now = Utc::now();
        let connected: Vec<AgentId> = candidates
            .into_iter()
            .filter(|candidate| connect_with_room(&mut state.graph, &id, candidate, selection, now))
            .collect();

        info!("Added {} '{}' with {} connections", agent_type, id, connected.len());

        let details = json!({
            "agent_id": id,
            "agent_type": agent_type,
            "connections": connected,
        });
        self.after_change(state, Some((ChangeType::AgentAdded, details)));
        Ok(connected)
    }

    /// Remove an agent and heal its former neighbours.
    ///
    /// Unknown ids are logged and ignored; returns whether anything changed.
    pub fn remove_agent(&self, agent_id: &str) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some((_, former_neighbors)) = state.graph.remove_node(agent_id) else {
            warn!("Ignoring removal of unknown agent '{}'", agent_id);
            return false;
        };

        let healing = heal_after_removal(
            &mut state.graph,
            &former_neighbors,
            &state.config,
            &mut state.rng,
            Utc::now(),
        );
        info!(
            "Removed '{}' ({} former neighbours, {} healing connections)",
            agent_id,
            former_neighbors.len(),
            healing.added.len()
        );

        let details = json!({
            "agent_id": agent_id,
            "former_neighbors": former_neighbors,
            "healed_connections": healing.added.len(),
            "under_connected": healing.under_connected,
        });
        self.after_change(state, Some((ChangeType::AgentRemoved, details)));
        true
    }

    /// Mark an agent as failed and route its neighbours around it.
    ///
    /// The agent and its connections stay in place.
    pub fn handle_agent_failure(&self, agent_id: &str) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let now = Utc::now();

        if !mark_failed(&mut state.graph, agent_id, now) {
            return false;
        }
        let healing = heal_after_failure(&mut state.graph, agent_id, &state.config, &mut state.rng, now);
        warn!(
            "Agent '{}' failed, {} alternative connections added",
            agent_id,
            healing.added.len()
        );

        let details = json!({
            "agent_id": agent_id,
            "alternative_connections": healing.added.len(),
        });
        self.after_change(state, Some((ChangeType::AgentFailed, details)));
        true
    }

    /// Replace the load, performance, capabilities and location of a
    /// registered agent. A failed agent reporting a non-zero success rate is
    /// no longer treated as degraded.
    pub fn update_agent(&self, agent: Agent) -> Result<(), TopologyError> {
        agent.validate()?;

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let id = agent.id.clone();

        let Some(node) = state.graph.node_mut(&id) else {
            return Err(TopologyError::UnknownAgent(id));
        };
        if node.degraded && agent.performance.success_rate > 0.0 {
            info!("Agent '{}' recovered", id);
            node.degraded = false;
        }
        node.agent = Agent {
            last_seen: Utc::now(),
            ..agent
        };

        state.graph.refresh_reliability(&id);
        refresh_weights(&mut state.graph, &id);
        debug!("Updated agent '{}'", id);

        self.after_change(state, None);
        Ok(())
    }

    /// Note traffic on a connection so the optimizer does not prune it as idle
    pub fn record_activity(&self, a: &str, b: &str) -> bool {
        let mut state = self.state.lock();
        match state.graph.connection_mut(a, b) {
            Some(connection) => {
                connection.last_active = Utc::now();
                true
            }
            None => {
                warn!("No connection between '{}' and '{}' to record activity on", a, b);
                false
            }
        }
    }

    /// Run an optimization pass now unless one is already in progress
    pub fn force_optimization(&self) -> OptimizationOutcome {
        let Some(_flight) = OptimizationGuard::acquire(&self.is_optimizing) else {
            debug!("Optimization already in progress, skipping");
            return OptimizationOutcome::Skipped;
        };

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let report = self.run_pass(state);
        self.publish(state);
        self.dispatcher
            .dispatch(optimized_event(&report, state.metrics, self.optimization_passes()));
        OptimizationOutcome::Completed(report)
    }

    /// Metrics after the latest change
    pub fn metrics(&self) -> TopologyMetrics {
        self.snapshot.read().metrics
    }

    /// Copy-on-write view of the whole state after the latest change
    pub fn snapshot(&self) -> Arc<TopologySnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn topology_type(&self) -> TopologyType {
        self.snapshot.read().config.topology_type
    }

    pub fn topology_info(&self) -> TopologyInfo {
        let snapshot = self.snapshot();
        let index = snapshot.graph.adjacency();

        TopologyInfo {
            topology_type: snapshot.config.topology_type,
            node_count: snapshot.graph.node_count(),
            connection_count: snapshot.graph.connection_count(),
            components: connected_components(&index.adjacency, &[]).len(),
            degree_stats: degree_stats(&snapshot.graph),
            optimization_passes: self.optimization_passes(),
            config: snapshot.config.clone(),
        }
    }

    pub fn agent_info(&self, agent_id: &str) -> Option<AgentInfo> {
        let snapshot = self.snapshot();
        let node = snapshot.graph.node(agent_id)?;

        Some(AgentInfo {
            agent: node.agent.clone(),
            connection_count: node.degree(),
            neighbors: node.neighbors().map(str::to_string).collect(),
            centrality: node.centrality,
            cluster: node.cluster.clone(),
            degraded: node.degraded,
        })
    }

    /// Recorded samples, oldest first
    pub fn performance_history(&self) -> Vec<PerformanceSample> {
        self.history.lock().to_vec()
    }

    /// Append the current metrics to the performance history
    pub fn record_sample(&self) {
        let snapshot = self.snapshot();
        let sample = PerformanceSample {
            timestamp: Utc::now(),
            metrics: snapshot.metrics,
            topology: snapshot.config.topology_type,
            node_count: snapshot.graph.node_count(),
            connection_count: snapshot.graph.connection_count(),
        };
        self.history.lock().push(sample);
    }

    /// Completed optimization passes, automatic and forced
    pub fn optimization_passes(&self) -> u64 {
        self.optimization_passes.load(Ordering::Acquire)
    }

    pub fn is_optimizing(&self) -> bool {
        self.is_optimizing.load(Ordering::Acquire)
    }

    /// Whether the current metrics call for an optimization pass
    pub fn should_optimize(&self) -> bool {
        let snapshot = self.snapshot();
        should_optimize(&snapshot.metrics, &snapshot.config)
    }

    /// GraphViz rendering of the current topology
    pub fn to_dot(&self) -> String {
        let snapshot = self.snapshot();
        generate_dot(&snapshot.graph, snapshot.config.topology_type)
    }

    /// Wait until every change notification emitted so far was delivered
    pub fn flush_notifications(&self) {
        self.dispatcher.flush();
    }

    /// Recompute metrics, publish and notify. Structural changes, the ones
    /// that carry an event, may also trigger an optimization pass.
    ///
    /// Runs with the state lock held so events leave in mutation order.
    fn after_change(&self, state: &mut ManagerState, change: Option<(ChangeType, serde_json::Value)>) {
        state.metrics = refresh_metrics(&mut state.graph, &mut state.rng);

        let mut events = Vec::new();
        let structural = change.is_some();
        if let Some((change_type, details)) = change {
            events.push(TopologyEvent::new(change_type, details, state.metrics));
        }

        if structural && state.graph.node_count() >= 2 && should_optimize(&state.metrics, &state.config) {
            match OptimizationGuard::acquire(&self.is_optimizing) {
                Some(_flight) => {
                    let report = self.run_pass(state);
                    events.push(optimized_event(&report, state.metrics, self.optimization_passes()));
                }
                None => debug!("Optimization due but another pass is running"),
            }
        }

        self.publish(state);
        for event in events {
            self.dispatcher.dispatch(event);
        }
    }

    /// One strategy pass followed by a metrics refresh; the caller holds the
    /// single-flight flag
    fn run_pass(&self, state: &mut ManagerState) -> OptimizationReport {
        let ManagerState {
            graph,
            config,
            metrics,
            rng,
        } = state;

        let report = {
            let mut ctx = OptimizationContext {
                graph: &mut *graph,
                config: &mut *config,
                metrics: &*metrics,
                rng: &mut *rng,
                now: Utc::now(),
            };
            self.strategy.optimize(&mut ctx)
        };

        *metrics = refresh_metrics(graph, rng);
        let pass = self.optimization_passes.fetch_add(1, Ordering::AcqRel) + 1;

        info!(
            "Optimization pass {} ({}): {} -> {}, efficiency {:.3}",
            pass,
            self.strategy.kind().as_str(),
            report.previous_type,
            report.topology_type,
            metrics.efficiency
        );
        report
    }

    fn publish(&self, state: &ManagerState) {
        let snapshot = TopologySnapshot {
            graph: state.graph.clone(),
            config: state.config.clone(),
            metrics: state.metrics,
            taken_at: Utc::now(),
        };
        *self.snapshot.write() = Arc::new(snapshot);
    }
}

fn limits(config: &TopologyConfig) -> SelectionLimits {
    SelectionLimits {
        min_connections: config.min_connections,
        max_connections: config.max_connections,
    }
}

/// Re-score every connection of `agent_id` after its profile changed
fn refresh_weights(graph: &mut TopologyGraph, agent_id: &str) {
    let Some(agent) = graph.agent(agent_id).cloned() else {
        return;
    };
    for peer in graph.neighbors(agent_id) {
        let weight = match graph.agent(&peer) {
            Some(other) => score(&agent, other),
            None => continue,
        };
        if let Some(connection) = graph.connection_mut(agent_id, &peer) {
            connection.weight = weight;
        }
    }
}

fn optimized_event(report: &OptimizationReport, metrics: TopologyMetrics, pass: u64) -> TopologyEvent {
    let details = json!({
        "pass": pass,
        "previous_type": report.previous_type,
        "topology_type": report.topology_type,
        "migrated": report.migrated,
        "pruned": report.pruned,
        "extended": report.extended,
        "rebalanced": report.rebalanced,
        "shed": report.shed,
        "bottlenecks": report.analysis.bottlenecks,
    });
    TopologyEvent::new(ChangeType::TopologyOptimized, details, metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentType;
    use crate::events::MemorySink;

    fn seeded(topology_type: TopologyType, min: usize, max: usize) -> TopologyConfig {
        TopologyConfig {
            topology_type,
            min_connections: min,
            max_connections: max,
            seed: Some(11),
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = TopologyConfig {
            min_connections: 5,
            max_connections: 2,
            ..Default::default()
        };
        assert!(TopologyManager::new(config).is_err());
    }

    #[test]
    fn test_add_agent_errors() {
        let manager = TopologyManager::new(TopologyConfig {
            max_nodes: 1,
            ..seeded(TopologyType::Mesh, 1, 4)
        })
        .unwrap();

        manager.add_agent(Agent::new("a", AgentType::Worker)).unwrap();
        assert_eq!(
            manager.add_agent(Agent::new("a", AgentType::Worker)),
            Err(TopologyError::CapacityExceeded {
                id: "a".to_string(),
                max_nodes: 1
            })
        );

        let manager = TopologyManager::new(seeded(TopologyType::Mesh, 1, 4)).unwrap();
        manager.add_agent(Agent::new("a", AgentType::Worker)).unwrap();
        assert_eq!(
            manager.add_agent(Agent::new("a", AgentType::Bridge)),
            Err(TopologyError::DuplicateAgent("a".to_string()))
        );
        assert!(matches!(
            manager.add_agent(Agent::new("b", AgentType::Worker).with_load(1.5)),
            Err(TopologyError::InvalidAgent { .. })
        ));
        assert_eq!(manager.topology_info().node_count, 1);
    }

    #[test]
    fn test_first_agent_has_no_connections() {
        let manager = TopologyManager::new(seeded(TopologyType::Hybrid, 2, 8)).unwrap();
        let connected = manager.add_agent(Agent::new("solo", AgentType::Coordinator)).unwrap();
        assert!(connected.is_empty());
        assert_eq!(manager.optimization_passes(), 0);
        assert_eq!(manager.metrics().connectivity, 0.0);
    }

    #[test]
    fn test_failure_keeps_agent() {
        let manager = TopologyManager::new(seeded(TopologyType::Ring, 2, 4)).unwrap();
        for i in 0..4 {
            manager.add_agent(Agent::new(format!("a{}", i), AgentType::Worker)).unwrap();
        }
        assert!(manager.handle_agent_failure("a1"));
        assert!(!manager.handle_agent_failure("ghost"));

        let info = manager.agent_info("a1").unwrap();
        assert!(info.degraded);
        assert_eq!(info.agent.performance.success_rate, 0.0);
        assert!(manager.agent_info("ghost").is_none());
    }

    #[test]
    fn test_update_agent_recovers_failed_agent() {
        let manager = TopologyManager::new(seeded(TopologyType::Mesh, 1, 4)).unwrap();
        manager.add_agent(Agent::new("a", AgentType::Worker)).unwrap();
        manager.add_agent(Agent::new("b", AgentType::Worker)).unwrap();
        manager.handle_agent_failure("b");

        manager
            .update_agent(Agent::new("b", AgentType::Worker).with_load(0.3).with_success_rate(0.9))
            .unwrap();
        let info = manager.agent_info("b").unwrap();
        assert!(!info.degraded);
        assert_eq!(info.agent.load, 0.3);

        assert_eq!(
            manager.update_agent(Agent::new("ghost", AgentType::Worker)),
            Err(TopologyError::UnknownAgent("ghost".to_string()))
        );
    }

    #[test]
    fn test_update_agent_does_not_trigger_optimization() {
        let sink = Arc::new(MemorySink::new());
        let manager = TopologyManager::new(seeded(TopologyType::Mesh, 1, 4))
            .unwrap()
            .with_sink(sink.clone());
        for id in ["a", "b", "c", "d"] {
            manager.add_agent(Agent::new(id, AgentType::Worker).with_load(0.5)).unwrap();
        }
        manager.flush_notifications();
        let passes = manager.optimization_passes();
        let events = sink.events().len();

        for (id, load) in [("a", 0.0), ("b", 1.0), ("c", 0.0), ("d", 1.0)] {
            manager.update_agent(Agent::new(id, AgentType::Worker).with_load(load)).unwrap();
        }
        manager.flush_notifications();
        assert_eq!(manager.metrics().load_balance, 0.5);
        assert!(manager.should_optimize());
        assert_eq!(manager.optimization_passes(), passes);
        assert_eq!(sink.events().len(), events);

        // The next structural change picks up the pending pass
        manager.add_agent(Agent::new("e", AgentType::Worker).with_load(0.5)).unwrap();
        manager.flush_notifications();
        assert_eq!(manager.optimization_passes(), passes + 1);
        let types = sink.change_types();
        assert_eq!(
            types[types.len() - 2..].to_vec(),
            vec![ChangeType::AgentAdded, ChangeType::TopologyOptimized]
        );
    }

    #[test]
    fn test_record_activity() {
        let manager = TopologyManager::new(seeded(TopologyType::Mesh, 1, 4)).unwrap();
        manager.add_agent(Agent::new("a", AgentType::Worker)).unwrap();
        manager.add_agent(Agent::new("b", AgentType::Worker)).unwrap();
        assert!(manager.record_activity("a", "b"));
        assert!(!manager.record_activity("a", "ghost"));
    }

    #[test]
    fn test_events_follow_mutations() {
        let sink = Arc::new(MemorySink::new());
        let manager = TopologyManager::new(seeded(TopologyType::Star, 1, 2))
            .unwrap()
            .with_sink(sink.clone());

        manager.add_agent(Agent::new("c", AgentType::Coordinator)).unwrap();
        manager.add_agent(Agent::new("w1", AgentType::Worker)).unwrap();
        manager.remove_agent("w1");
        manager.remove_agent("ghost");
        manager.flush_notifications();

        let types: Vec<ChangeType> = sink
            .change_types()
            .into_iter()
            .filter(|t| *t != ChangeType::TopologyOptimized)
            .collect();
        assert_eq!(
            types,
            vec![ChangeType::AgentAdded, ChangeType::AgentAdded, ChangeType::AgentRemoved]
        );
        assert!(sink.events().iter().all(|e| e.event_type == "topology_change"));
    }

    #[test]
    fn test_dot_and_info() {
        let manager = TopologyManager::new(seeded(TopologyType::Mesh, 2, 4)).unwrap();
        for id in ["a", "b", "c"] {
            manager.add_agent(Agent::new(id, AgentType::Worker)).unwrap();
        }
        let info = manager.topology_info();
        assert_eq!(info.connection_count, 3);
        assert_eq!(info.components, 1);
        assert_eq!(info.degree_stats.min, 2);

        let dot = manager.to_dot();
        assert!(dot.starts_with("graph AgentTopology {"));
        assert!(dot.contains("\"a\" -- \"b\""));
    }
}
