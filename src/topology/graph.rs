//! Connectivity graph store.
//!
//! Nodes are kept in insertion order (ring and star layouts depend on it) and
//! connections live in one map keyed by the unordered endpoint pair, so the
//! "one connection per pair" invariant holds by construction. Each node only
//! records the keys of the connections it participates in.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentId};
use crate::topology::scorer::score;

/// Unordered pair of agent ids identifying a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionKey(AgentId, AgentId);

impl ConnectionKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self(a.to_string(), b.to_string())
        } else {
            Self(b.to_string(), a.to_string())
        }
    }

    pub fn endpoints(&self) -> (&str, &str) {
        (&self.0, &self.1)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0 == id || self.1 == id
    }

    /// The endpoint opposite to `id`, if `id` is an endpoint
    pub fn other(&self, id: &str) -> Option<&str> {
        if self.0 == id {
            Some(&self.1)
        } else if self.1 == id {
            Some(&self.0)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}<->{}", self.0, self.1)
    }
}

/// Undirected weighted link between two agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Pairwise score at creation time
    pub weight: f64,
    /// Milliseconds; the slower endpoint's location latency
    pub latency: f64,
    /// The smaller endpoint throughput
    pub bandwidth: f64,
    /// Mean endpoint success rate, in [0, 1]
    pub reliability: f64,
    pub last_active: DateTime<Utc>,
}

impl Connection {
    /// Derive link attributes from the two endpoints
    pub fn between(a: &Agent, b: &Agent, now: DateTime<Utc>) -> Self {
        let latency_of = |agent: &Agent| agent.location.as_ref().map(|l| l.latency).unwrap_or(0.0);

        Self {
            weight: score(a, b),
            latency: latency_of(a).max(latency_of(b)),
            bandwidth: a.performance.throughput.min(b.performance.throughput),
            reliability: pair_reliability(a, b),
            last_active: now,
        }
    }
}

fn pair_reliability(a: &Agent, b: &Agent) -> f64 {
    ((a.performance.success_rate + b.performance.success_rate) / 2.0).clamp(0.0, 1.0)
}

/// Structural importance scores of a node, each in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Centrality {
    pub degree: f64,
    pub betweenness: f64,
    pub closeness: f64,
    pub eigenvector: f64,
}

/// Graph-internal representation of one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub agent: Agent,
    connections: BTreeSet<ConnectionKey>,
    pub centrality: Centrality,
    pub cluster: Option<String>,
    /// Set when the agent has been reported as failed
    pub degraded: bool,
}

impl Node {
    fn new(agent: Agent) -> Self {
        Self {
            agent,
            connections: BTreeSet::new(),
            centrality: Centrality::default(),
            cluster: None,
            degraded: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.agent.id
    }

    pub fn degree(&self) -> usize {
        self.connections.len()
    }

    pub fn connection_keys(&self) -> impl Iterator<Item = &ConnectionKey> {
        self.connections.iter()
    }

    pub fn neighbors(&self) -> impl Iterator<Item = &str> {
        let id = self.agent.id.as_str();
        self.connections.iter().filter_map(move |key| key.other(id))
    }
}

/// Index-based view of the graph used by the metric algorithms
#[derive(Debug, Clone, Default)]
pub struct AdjacencyIndex {
    /// Node ids in insertion order; position is the node index
    pub ids: Vec<AgentId>,
    pub adjacency: Vec<Vec<usize>>,
}

impl AdjacencyIndex {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Node and connection store
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    nodes: HashMap<AgentId, Node>,
    order: Vec<AgentId>,
    connections: BTreeMap<ConnectionKey, Connection>,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Node ids in insertion order
    pub fn ids(&self) -> &[AgentId] {
        &self.order
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(move |id| self.nodes.get(id))
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.nodes().map(|node| &node.agent)
    }

    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.nodes.get(id).map(|node| &node.agent)
    }

    /// Register a new node. Returns false if the id is already present.
    pub fn add_node(&mut self, agent: Agent) -> bool {
        if self.nodes.contains_key(&agent.id) {
            return false;
        }
        self.order.push(agent.id.clone());
        self.nodes.insert(agent.id.clone(), Node::new(agent));
        true
    }

    /// Remove a node together with every incident connection.
    ///
    /// Returns the removed node and the ids it was connected to.
    pub fn remove_node(&mut self, id: &str) -> Option<(Node, Vec<AgentId>)> {
        let node = self.nodes.remove(id)?;
        self.order.retain(|existing| existing != id);

        let mut former_neighbors = Vec::with_capacity(node.degree());
        for key in node.connection_keys() {
            self.connections.remove(key);
            if let Some(other) = key.other(id) {
                if let Some(peer) = self.nodes.get_mut(other) {
                    peer.connections.remove(key);
                }
                former_neighbors.push(other.to_string());
            }
        }

        Some((node, former_neighbors))
    }

    /// Create a connection between two existing, distinct, unconnected nodes.
    ///
    /// Returns true only when a new connection was created.
    pub fn connect(&mut self, a: &str, b: &str, now: DateTime<Utc>) -> bool {
        if a == b {
            return false;
        }
        let (Some(node_a), Some(node_b)) = (self.nodes.get(a), self.nodes.get(b)) else {
            warn!("Ignoring connection {} <-> {}: unknown agent", a, b);
            return false;
        };

        let key = ConnectionKey::new(a, b);
        if self.connections.contains_key(&key) {
            return false;
        }

        let connection = Connection::between(&node_a.agent, &node_b.agent, now);
        debug!("Connecting {} (weight {:.3})", key, connection.weight);
        self.connections.insert(key.clone(), connection);
        for id in [a, b] {
            if let Some(node) = self.nodes.get_mut(id) {
                node.connections.insert(key.clone());
            }
        }
        true
    }

    /// Remove the connection between `a` and `b`, if any
    pub fn disconnect(&mut self, a: &str, b: &str) -> bool {
        if !self.contains(a) || !self.contains(b) {
            warn!("Ignoring disconnect {} <-> {}: unknown agent", a, b);
            return false;
        }
        let key = ConnectionKey::new(a, b);
        self.remove_connection(&key)
    }

    fn remove_connection(&mut self, key: &ConnectionKey) -> bool {
        if self.connections.remove(key).is_none() {
            return false;
        }
        let (a, b) = key.endpoints();
        for id in [a, b] {
            if let Some(node) = self.nodes.get_mut(id) {
                node.connections.remove(key);
            }
        }
        true
    }

    pub fn are_connected(&self, a: &str, b: &str) -> bool {
        self.connections.contains_key(&ConnectionKey::new(a, b))
    }

    pub fn connection(&self, a: &str, b: &str) -> Option<&Connection> {
        self.connections.get(&ConnectionKey::new(a, b))
    }

    pub fn connection_mut(&mut self, a: &str, b: &str) -> Option<&mut Connection> {
        self.connections.get_mut(&ConnectionKey::new(a, b))
    }

    pub fn connections(&self) -> impl Iterator<Item = (&ConnectionKey, &Connection)> {
        self.connections.iter()
    }

    /// Neighbour ids of `id`; empty for unknown ids
    pub fn neighbors(&self, id: &str) -> Vec<AgentId> {
        self.nodes
            .get(id)
            .map(|node| node.neighbors().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Live connection count of `id`; 0 for unknown ids
    pub fn degree(&self, id: &str) -> usize {
        self.nodes.get(id).map(Node::degree).unwrap_or(0)
    }

    /// Drop every connection, keeping the nodes
    pub fn clear_connections(&mut self) {
        self.connections.clear();
        for node in self.nodes.values_mut() {
            node.connections.clear();
            node.cluster = None;
        }
    }

    /// Keep only the connections for which `keep` returns true.
    ///
    /// Returns the keys of the removed connections.
    pub fn retain_connections<F>(&mut self, mut keep: F) -> Vec<ConnectionKey>
    where
        F: FnMut(&ConnectionKey, &Connection) -> bool,
    {
        let doomed: Vec<ConnectionKey> = self
            .connections
            .iter()
            .filter(|(key, connection)| !keep(*key, *connection))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            self.remove_connection(key);
        }
        doomed
    }

    /// Recompute the reliability of every connection incident to `id`
    pub fn refresh_reliability(&mut self, id: &str) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let keys: Vec<ConnectionKey> = node.connections.iter().cloned().collect();
        for key in keys {
            let (a, b) = key.endpoints();
            let reliability = match (self.agent(a), self.agent(b)) {
                (Some(agent_a), Some(agent_b)) => pair_reliability(agent_a, agent_b),
                _ => continue,
            };
            if let Some(connection) = self.connections.get_mut(&key) {
                connection.reliability = reliability;
            }
        }
    }

    /// Index-based adjacency lists, in node insertion order
    pub fn adjacency(&self) -> AdjacencyIndex {
        let position: HashMap<&str, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(index, id)| (id.as_str(), index))
            .collect();

        let adjacency = self
            .order
            .iter()
            .map(|id| {
                self.nodes
                    .get(id)
                    .map(|node| {
                        node.neighbors()
                            .filter_map(|neighbor| position.get(neighbor).copied())
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect();

        AdjacencyIndex {
            ids: self.order.clone(),
            adjacency,
        }
    }
}
