// worker thread stuff
use super::panic_handler::PanicHandler;
use super::qos::{self, Qos};
use super::specific::{self, QueueKey};
use super::task::Task;
use crate::config::Config;
use crate::error::{Error, Result};
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicU64, Ordering};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Counters shared by every thread serving one queue.
#[derive(Debug, Default)]
pub(crate) struct QueueCounters {
    submitted: AtomicU64,
    executed: AtomicU64,
    panicked: AtomicU64,
}

impl QueueCounters {
    pub(crate) fn record_submit(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> QueueStats {
        QueueStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counters of a queue. Work run inline by an
/// `ExecutionContext` never reaches the queue and is not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub submitted: u64,
    pub executed: u64,
    pub panicked: u64,
}

impl QueueStats {
    /// Submitted work not yet finished (queued or running).
    pub fn pending(&self) -> u64 {
        self.submitted.saturating_sub(self.executed)
    }
}

/// Runs tasks on behalf of one queue. Cloned into every thread of that
/// queue; the main loop drives one directly.
#[derive(Debug, Clone)]
pub(crate) struct Worker {
    pub label: Arc<str>,
    pub qos: Qos,
    pub key: Option<QueueKey>,
    pub panic_handler: Arc<PanicHandler>,
    pub counters: Arc<QueueCounters>,
}

impl Worker {
    pub fn new(label: Arc<str>, qos: Qos, key: Option<QueueKey>, config: &Config) -> Self {
        Self {
            label,
            qos,
            key,
            panic_handler: Arc::new(PanicHandler::new(config.panic_strategy)),
            counters: Arc::new(QueueCounters::default()),
        }
    }

    /// Starts a named OS thread draining `rx` until every sender is gone.
    pub fn spawn(
        &self,
        thread_name: String,
        rx: Receiver<Task>,
        config: &Config,
    ) -> Result<JoinHandle<()>> {
        let mut builder = thread::Builder::new().name(thread_name.clone());

        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let lower_priority = config.lower_background_priority;
        let worker = self.clone();
        builder
            .spawn(move || {
                if lower_priority {
                    qos::apply_thread_niceness(worker.qos);
                }
                worker.run(rx);
            })
            .map_err(|e| self.spawn_failed(&thread_name, e))
    }

    fn spawn_failed(&self, thread_name: &str, e: io::Error) -> Error {
        tracing::error!(
            queue = %self.label,
            thread = thread_name,
            error = %e,
            "failed to start queue thread"
        );
        Error::from(e)
    }

    // main loop
    pub fn run(&self, rx: Receiver<Task>) {
        tracing::debug!(queue = %self.label, qos = %self.qos, "worker started");

        while let Ok(task) = rx.recv() {
            self.execute_task(task);
        }

        tracing::debug!(queue = %self.label, "worker exiting, queue released");
    }

    /// Runs one task with this queue's tag installed.
    ///
    /// The task's effective tier is what [`Qos::current`] reports while it
    /// runs. OS thread priority stays at the queue's tier: a niceness raised
    /// for one background task could not be lowered again without
    /// privileges, so per-submission QoS is advisory.
    pub fn execute_task(&self, task: Task) {
        let effective = task.qos.resolve(self.qos);
        tracing::trace!(
            queue = %self.label,
            qos = %effective,
            queued_for = ?task.queued_for(),
            "running task"
        );
        let _entered = specific::enter(self.key, effective);

        let result = self
            .panic_handler
            .execute(&self.label, move || task.execute());

        if result.is_err() {
            self.counters.panicked.fetch_add(1, Ordering::Relaxed);
        }
        self.counters.executed.fetch_add(1, Ordering::Relaxed);
    }
}
