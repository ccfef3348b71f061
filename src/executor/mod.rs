//! Platform execution contexts.
//!
//! This module provides the primitive queues that [`ExecutionContext`]
//! dispatches onto: the designated main thread, one concurrent pool per
//! QoS tier, and serial lanes. A [`NativeQueue`] knows nothing about
//! "current context"; it only accepts work.
//!
//! [`ExecutionContext`]: crate::ExecutionContext

pub mod cpu_pool;
pub mod main_thread;
pub mod panic_handler;
pub mod qos;
pub mod serial;
pub mod specific;
pub mod task;
pub mod timer;
pub mod worker;

pub use main_thread::{install_main_thread, is_main_thread, MainLoop, StopHandle};
pub use panic_handler::PanicStrategy;
pub use qos::Qos;
pub use specific::QueueKey;
pub use worker::QueueStats;

pub(crate) use task::Task;

use crate::config::Config;
use crate::error::Result;
use cpu_pool::CpuPool;
use main_thread::MainQueue;
use serial::SerialLane;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use task::QosRequest;
use timer::Timer;

#[derive(Clone)]
enum QueueKind {
    Main(&'static MainQueue),
    Serial(Arc<SerialLane>),
    Concurrent(&'static CpuPool),
}

/// Handle on a platform execution context. Cloning is cheap; clones refer
/// to the same queue.
#[derive(Clone)]
pub struct NativeQueue {
    kind: QueueKind,
}

/// The main queue. Work runs on the thread designated with
/// [`install_main_thread`], whenever that thread drives its [`MainLoop`].
pub fn main() -> NativeQueue {
    NativeQueue {
        kind: QueueKind::Main(MainQueue::global()),
    }
}

/// The process-wide concurrent pool for `qos`, started on first use.
pub fn global(qos: Qos) -> NativeQueue {
    static BACKGROUND: OnceLock<CpuPool> = OnceLock::new();
    static UTILITY: OnceLock<CpuPool> = OnceLock::new();
    static DEFAULT: OnceLock<CpuPool> = OnceLock::new();
    static USER_INITIATED: OnceLock<CpuPool> = OnceLock::new();
    static USER_INTERACTIVE: OnceLock<CpuPool> = OnceLock::new();

    let slot = match qos {
        Qos::Background => &BACKGROUND,
        Qos::Utility => &UTILITY,
        Qos::Default => &DEFAULT,
        Qos::UserInitiated => &USER_INITIATED,
        Qos::UserInteractive => &USER_INTERACTIVE,
    };

    let pool = slot.get_or_init(|| {
        CpuPool::new(qos, Some(QueueKey::next()), crate::config::current())
            .expect("platform failed to start a concurrent pool")
    });

    NativeQueue {
        kind: QueueKind::Concurrent(pool),
    }
}

impl NativeQueue {
    /// Creates a serial queue with its own thread. No identity key is
    /// installed on it.
    ///
    /// # Panics
    ///
    /// If the OS refuses to start the thread; see [`NativeQueue::try_serial`].
    pub fn serial(label: &str, qos: Qos) -> NativeQueue {
        Self::try_serial(label, qos).expect("platform failed to start a serial lane")
    }

    pub fn try_serial(label: &str, qos: Qos) -> Result<NativeQueue> {
        Self::try_serial_with(label, qos, None, crate::config::current())
    }

    pub(crate) fn try_serial_with(
        label: &str,
        qos: Qos,
        key: Option<QueueKey>,
        config: &Config,
    ) -> Result<NativeQueue> {
        let lane = SerialLane::spawn(label, qos, key, config)?;
        Ok(NativeQueue {
            kind: QueueKind::Serial(Arc::new(lane)),
        })
    }

    pub(crate) fn submit(&self, task: Task) {
        match &self.kind {
            QueueKind::Main(queue) => queue.submit(task),
            QueueKind::Serial(lane) => lane.submit(task),
            QueueKind::Concurrent(pool) => pool.submit(task),
        }
    }

    /// Enqueues `f` and returns immediately.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Task::new(f));
    }

    /// Enqueues `f` to run at `qos` instead of the queue's tier. With
    /// `enforce` the tier is used as given; otherwise the platform may
    /// raise it to the queue's own tier.
    pub fn execute_with_qos<F>(&self, qos: Qos, enforce: bool, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Task::with_qos(f, qos, enforce));
    }

    /// Enqueues `f` once `deadline` has passed.
    pub fn execute_at<F>(&self, deadline: Instant, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        Timer::global().schedule(deadline, self.clone(), Task::new(f));
    }

    /// Runs `f` on this queue and blocks until it has finished, returning
    /// its value. A panic inside `f` resumes on the caller.
    ///
    /// There is no reentrancy check here: calling this from work already
    /// running on the same serial queue deadlocks.
    pub fn execute_and_wait<'a, F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send + 'a,
        R: Send + 'a,
    {
        let (tx, rx) = crossbeam_channel::bounded(1);

        // Field order matters: `work` is dropped before `reply`, so the
        // waiting caller cannot return while `work` is still alive.
        struct Waited<F, R> {
            work: F,
            reply: crossbeam_channel::Sender<std::thread::Result<R>>,
        }

        let job = Waited { work: f, reply: tx };
        let func: Box<dyn FnOnce() + Send + 'a> = Box::new(move || {
            let Waited { work, reply } = job;
            let result = panic::catch_unwind(AssertUnwindSafe(work));
            let _ = reply.send(result);
        });

        // SAFETY: the borrow in `func` outlives the call because we block on
        // `rx` until the closure has run or been dropped, and either way it
        // releases `reply` only after `work` is gone.
        let func: Box<dyn FnOnce() + Send + 'static> = unsafe { std::mem::transmute(func) };
        self.submit(Task::from_boxed(func, QosRequest::Inherit));

        match rx.recv() {
            Ok(Ok(value)) => value,
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => panic!("queue `{}` dropped work it accepted", self.label()),
        }
    }

    pub fn label(&self) -> &str {
        match &self.kind {
            QueueKind::Main(queue) => queue.label(),
            QueueKind::Serial(lane) => lane.label(),
            QueueKind::Concurrent(pool) => pool.label(),
        }
    }

    pub fn qos(&self) -> Qos {
        match &self.kind {
            QueueKind::Main(queue) => queue.qos(),
            QueueKind::Serial(lane) => lane.qos(),
            QueueKind::Concurrent(pool) => pool.qos(),
        }
    }

    pub fn is_main(&self) -> bool {
        matches!(self.kind, QueueKind::Main(_))
    }

    pub fn is_serial(&self) -> bool {
        matches!(self.kind, QueueKind::Serial(_) | QueueKind::Main(_))
    }

    /// How many units of work may run at once: 1 for serial queues.
    pub fn parallelism(&self) -> usize {
        match &self.kind {
            QueueKind::Main(_) | QueueKind::Serial(_) => 1,
            QueueKind::Concurrent(pool) => pool.num_threads(),
        }
    }

    /// Identity key installed on this queue, if any.
    pub fn key(&self) -> Option<QueueKey> {
        match &self.kind {
            QueueKind::Main(queue) => queue.key(),
            QueueKind::Serial(lane) => lane.key(),
            QueueKind::Concurrent(pool) => pool.key(),
        }
    }

    /// True if both handles refer to the same platform queue.
    pub fn same_queue(&self, other: &NativeQueue) -> bool {
        match (&self.kind, &other.kind) {
            (QueueKind::Main(_), QueueKind::Main(_)) => true,
            (QueueKind::Serial(a), QueueKind::Serial(b)) => Arc::ptr_eq(a, b),
            (QueueKind::Concurrent(a), QueueKind::Concurrent(b)) => std::ptr::eq(*a, *b),
            _ => false,
        }
    }

    pub fn stats(&self) -> QueueStats {
        match &self.kind {
            QueueKind::Main(queue) => queue.stats(),
            QueueKind::Serial(lane) => lane.stats(),
            QueueKind::Concurrent(pool) => pool.stats(),
        }
    }
}

impl fmt::Debug for NativeQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            QueueKind::Main(_) => "main",
            QueueKind::Serial(_) => "serial",
            QueueKind::Concurrent(_) => "concurrent",
        };
        f.debug_struct("NativeQueue")
            .field("kind", &kind)
            .field("label", &self.label())
            .field("qos", &self.qos())
            .finish()
    }
}
