//! Topology change notifications.
//!
//! Every structural change produces one [`TopologyEvent`]. Events are handed
//! to a background dispatcher thread and fanned out to the registered
//! [`ChangeSink`]s in mutation order. Delivery is best-effort: a failing sink
//! is logged and skipped, and mutations never wait on it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use log::{info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::TopologyMetrics;

pub const EVENT_TYPE: &str = "topology_change";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    AgentAdded,
    AgentRemoved,
    AgentFailed,
    TopologyOptimized,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::AgentAdded => "agent_added",
            ChangeType::AgentRemoved => "agent_removed",
            ChangeType::AgentFailed => "agent_failed",
            ChangeType::TopologyOptimized => "topology_optimized",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structural change with the metrics measured right after it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub change_type: ChangeType,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub metrics: TopologyMetrics,
}

impl TopologyEvent {
    pub fn new(change_type: ChangeType, details: serde_json::Value, metrics: TopologyMetrics) -> Self {
        Self {
            event_type: EVENT_TYPE.to_string(),
            change_type,
            details,
            timestamp: Utc::now(),
            metrics,
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sink rejected event: {0}")]
    Rejected(String),
}

/// Receiver of topology change notifications
pub trait ChangeSink: Send + Sync {
    fn notify(&self, event: &TopologyEvent) -> Result<(), SinkError>;
}

/// Writes a one-line summary of every event to the log
#[derive(Debug, Default)]
pub struct LogSink;

impl ChangeSink for LogSink {
    fn notify(&self, event: &TopologyEvent) -> Result<(), SinkError> {
        info!(
            "{}: {} (efficiency={:.3}, resilience={:.2})",
            event.change_type, event.details, event.metrics.efficiency, event.metrics.resilience
        );
        Ok(())
    }
}

/// Appends every event as one JSON object per line
pub struct JsonLinesSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl ChangeSink for JsonLinesSink {
    fn notify(&self, event: &TopologyEvent) -> Result<(), SinkError> {
        let line = serde_json::to_string(event)?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TopologyEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TopologyEvent> {
        self.events.lock().clone()
    }

    pub fn change_types(&self) -> Vec<ChangeType> {
        self.events.lock().iter().map(|event| event.change_type).collect()
    }
}

impl ChangeSink for MemorySink {
    fn notify(&self, event: &TopologyEvent) -> Result<(), SinkError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

enum Message {
    Event(TopologyEvent),
    Flush(Sender<()>),
}

type SinkList = Arc<RwLock<Vec<Arc<dyn ChangeSink>>>>;

/// Background thread fanning events out to the registered sinks
pub struct SinkDispatcher {
    sinks: SinkList,
    sender: Option<Sender<Message>>,
    worker: Option<JoinHandle<()>>,
}

impl SinkDispatcher {
    pub fn spawn() -> Self {
        let sinks: SinkList = Arc::new(RwLock::new(Vec::new()));
        let (sender, receiver) = mpsc::channel();
        let worker_sinks = Arc::clone(&sinks);
        let worker = thread::spawn(move || run_dispatcher(receiver, worker_sinks));

        Self {
            sinks,
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    pub fn add_sink(&self, sink: Arc<dyn ChangeSink>) {
        self.sinks.write().push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.read().len()
    }

    /// Queue an event without waiting for delivery
    pub fn dispatch(&self, event: TopologyEvent) {
        if let Some(sender) = &self.sender {
            if sender.send(Message::Event(event)).is_err() {
                warn!("Change dispatcher has stopped, dropping event");
            }
        }
    }

    /// Block until every event queued so far has been delivered
    pub fn flush(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let (ack, done) = mpsc::channel();
        if sender.send(Message::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }
}

impl Drop for SinkDispatcher {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop after it drains
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Change dispatcher thread panicked");
            }
        }
    }
}

fn run_dispatcher(receiver: Receiver<Message>, sinks: SinkList) {
    for message in receiver {
        match message {
            Message::Event(event) => {
                let targets = sinks.read().clone();
                for sink in targets {
                    if let Err(e) = sink.notify(&event) {
                        warn!("Change sink failed on {}: {}", event.change_type, e);
                    }
                }
            }
            Message::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Read;

    struct FailingSink;

    impl ChangeSink for FailingSink {
        fn notify(&self, _event: &TopologyEvent) -> Result<(), SinkError> {
            Err(SinkError::Rejected("always".to_string()))
        }
    }

    fn event(change_type: ChangeType) -> TopologyEvent {
        TopologyEvent::new(change_type, json!({"agent_id": "a1"}), TopologyMetrics::empty())
    }

    #[test]
    fn test_event_serialization() {
        let value = serde_json::to_value(event(ChangeType::AgentFailed)).unwrap();
        assert_eq!(value["type"], "topology_change");
        assert_eq!(value["change_type"], "agent_failed");
        assert_eq!(value["details"]["agent_id"], "a1");
        assert!(value["metrics"]["efficiency"].is_number());
    }

    #[test]
    fn test_event_from_disconnected_graph_reads_back() {
        use crate::agent::{Agent, AgentType};
        use crate::analysis::{refresh_metrics, UNREACHABLE};
        use crate::topology::TopologyGraph;
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let mut graph = TopologyGraph::new();
        graph.add_node(Agent::new("a1", AgentType::Worker));
        graph.add_node(Agent::new("a2", AgentType::Worker));
        let metrics = refresh_metrics(&mut graph, &mut StdRng::seed_from_u64(1));
        assert_eq!(metrics.average_path_length, UNREACHABLE);

        let original = TopologyEvent::new(ChangeType::AgentAdded, json!({"agent_id": "a2"}), metrics);
        let line = serde_json::to_string(&original).unwrap();
        let parsed: TopologyEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.change_type, ChangeType::AgentAdded);
        assert_eq!(parsed.details, original.details);
        assert_eq!(parsed.timestamp, original.timestamp);
        assert_eq!(parsed.metrics.average_path_length, UNREACHABLE);
        assert_eq!(parsed.metrics.network_diameter, UNREACHABLE);
    }

    #[test]
    fn test_dispatch_in_order_despite_failures() {
        let dispatcher = SinkDispatcher::spawn();
        let memory = Arc::new(MemorySink::new());
        dispatcher.add_sink(Arc::new(FailingSink));
        dispatcher.add_sink(memory.clone());
        assert_eq!(dispatcher.sink_count(), 2);

        dispatcher.dispatch(event(ChangeType::AgentAdded));
        dispatcher.dispatch(event(ChangeType::AgentRemoved));
        dispatcher.dispatch(event(ChangeType::TopologyOptimized));
        dispatcher.flush();

        assert_eq!(
            memory.change_types(),
            vec![ChangeType::AgentAdded, ChangeType::AgentRemoved, ChangeType::TopologyOptimized]
        );
    }

    #[test]
    fn test_json_lines_sink() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let sink = JsonLinesSink::create(file.path()).unwrap();
        sink.notify(&event(ChangeType::AgentAdded)).unwrap();
        sink.notify(&event(ChangeType::AgentRemoved)).unwrap();

        let mut contents = String::new();
        File::open(file.path()).unwrap().read_to_string(&mut contents).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["change_type"], "agent_removed");
    }
}
