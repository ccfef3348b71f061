use super::qos::Qos;
use super::specific::QueueKey;
use super::task::Task;
use super::worker::{QueueStats, Worker};
use crate::config::Config;
use crate::error::Result;
use crossbeam_channel::{unbounded, Sender};
use std::sync::Arc;

/// A serial platform queue: one dedicated thread, work runs one unit at a
/// time in the order it was accepted.
///
/// The thread exits once every handle (including pending delayed
/// submissions) is dropped and the backlog is drained.
pub(crate) struct SerialLane {
    worker: Worker,
    tx: Sender<Task>,
}

impl SerialLane {
    pub fn spawn(label: &str, qos: Qos, key: Option<QueueKey>, config: &Config) -> Result<Self> {
        let worker = Worker::new(Arc::from(label), qos, key, config);
        let (tx, rx) = unbounded();

        let thread_name = if label.is_empty() {
            format!("{}-lane", config.thread_name_prefix)
        } else {
            format!("{}-{}", config.thread_name_prefix, label)
        };

        // Detached: the thread ends when `tx` and all its clones are gone.
        let _handle = worker.spawn(thread_name, rx, config)?;

        tracing::debug!(lane = label, %qos, "serial lane started");

        Ok(Self { worker, tx })
    }

    pub fn submit(&self, task: Task) {
        self.worker.counters.record_submit();
        // The receiving thread only exits after all senders are dropped.
        let _ = self.tx.send(task);
    }

    pub fn label(&self) -> &str {
        &self.worker.label
    }

    pub fn qos(&self) -> Qos {
        self.worker.qos
    }

    pub fn key(&self) -> Option<QueueKey> {
        self.worker.key
    }

    pub fn stats(&self) -> QueueStats {
        self.worker.counters.snapshot()
    }
}
