//! Task representation and execution.

use super::qos::Qos;
use std::time::{Duration, Instant};

/// QoS asked for by a single submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QosRequest {
    /// Run at the queue's tier.
    Inherit,
    /// Run at `qos`. Without `enforce` the platform may raise it to the
    /// queue's tier.
    Explicit { qos: Qos, enforce: bool },
}

impl QosRequest {
    pub(crate) fn resolve(self, queue_qos: Qos) -> Qos {
        match self {
            QosRequest::Inherit => queue_qos,
            QosRequest::Explicit { qos, enforce: true } => qos,
            QosRequest::Explicit { qos, enforce: false } => qos.max(queue_qos),
        }
    }
}

/// Internal task representation
pub(crate) struct Task {
    pub(crate) func: Box<dyn FnOnce() + Send + 'static>,
    pub(crate) qos: QosRequest,
    pub(crate) spawn_time: Instant,
}

impl Task {
    /// Create a task that runs at its queue's tier
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::from_boxed(Box::new(f), QosRequest::Inherit)
    }

    /// Create a task with an explicit QoS request
    pub fn with_qos<F>(f: F, qos: Qos, enforce: bool) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::from_boxed(Box::new(f), QosRequest::Explicit { qos, enforce })
    }

    pub(crate) fn from_boxed(func: Box<dyn FnOnce() + Send + 'static>, qos: QosRequest) -> Self {
        Task {
            func,
            qos,
            spawn_time: Instant::now(),
        }
    }

    /// Time since the task was submitted.
    pub fn queued_for(&self) -> Duration {
        self.spawn_time.elapsed()
    }

    /// Execute the task
    pub fn execute(self) {
        (self.func)();
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("qos", &self.qos)
            .field("spawn_time", &self.spawn_time)
            .finish()
    }
}
