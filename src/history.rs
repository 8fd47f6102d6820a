//! Performance history and the periodic metrics sampler.

use std::collections::VecDeque;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::TopologyMetrics;
use crate::manager::TopologyManager;
use crate::topology::TopologyType;

/// Metrics observed at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub timestamp: DateTime<Utc>,
    pub metrics: TopologyMetrics,
    pub topology: TopologyType,
    pub node_count: usize,
    pub connection_count: usize,
}

/// Fixed-capacity ring buffer of samples, oldest first
#[derive(Debug, Clone)]
pub struct PerformanceHistory {
    samples: VecDeque<PerformanceSample>,
    capacity: usize,
}

impl PerformanceHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest when full
    pub fn push(&mut self, sample: PerformanceSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&PerformanceSample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PerformanceSample> {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<PerformanceSample> {
        self.samples.iter().cloned().collect()
    }
}

/// Records a history sample from a manager at a fixed interval
pub struct MetricsSampler;

impl MetricsSampler {
    /// Start sampling on a background thread.
    ///
    /// The thread holds only a weak reference, so it also ends once the
    /// manager is dropped.
    pub fn spawn(manager: &Arc<TopologyManager>, interval: Duration) -> SamplerHandle {
        let (stop, stopped) = mpsc::channel::<()>();
        let manager: Weak<TopologyManager> = Arc::downgrade(manager);

        let worker = thread::spawn(move || loop {
            match stopped.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => match manager.upgrade() {
                    Some(manager) => manager.record_sample(),
                    None => break,
                },
                // Stop requested or handle dropped
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        debug!("Metrics sampler started, interval {:?}", interval);
        SamplerHandle {
            stop: Some(stop),
            worker: Some(worker),
        }
    }
}

/// Owner of a running sampler; stopping or dropping it ends the thread
pub struct SamplerHandle {
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl SamplerHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|worker| !worker.is_finished())
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Metrics sampler thread panicked");
            }
            debug!("Metrics sampler stopped");
        }
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
