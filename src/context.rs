//! Identity-aware execution contexts.
//!
//! An [`ExecutionContext`] wraps a platform queue and remembers the
//! identity key it installed there. Work submitted through it can tell
//! whether the caller is already running on that queue and, if so, skip
//! the scheduler:
//!
//! - [`async_`](ExecutionContext::async_) and [`sync`](ExecutionContext::sync)
//!   run inline when the context is current. That keeps `sync` from
//!   deadlocking when called from inside its own serial context.
//! - [`just_dispatch`](ExecutionContext::just_dispatch),
//!   [`just_dispatch_with_qos`](ExecutionContext::just_dispatch_with_qos) and
//!   [`after`](ExecutionContext::after) always go through the queue.
//!
//! # Ordering
//!
//! Work enqueued on a serial context runs one unit at a time in acceptance
//! order. Inline work does not take part in that order: it runs on the
//! submitting stack immediately, so mixing inline and enqueued submissions
//! to one serial context does not yield a single total order. Concurrent
//! contexts give no ordering at all.
//!
//! ```no_run
//! use strand_rs::{ExecutionContext, Qos};
//!
//! let db = ExecutionContext::create(Some("db"), Qos::Utility);
//! let inner = db.clone();
//! db.async_(move || {
//!     // Already on `db`: runs inline instead of deadlocking.
//!     let rows = inner.sync(|| 42);
//!     assert_eq!(rows, 42);
//! });
//! ```

use crate::error::Result;
use crate::executor::{self, specific, NativeQueue, Qos, QueueKey};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Delays past this are treated as "practically never".
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

static MAIN_CONTEXT: OnceLock<ExecutionContext> = OnceLock::new();
static DEFAULT_CONTEXT: OnceLock<ExecutionContext> = OnceLock::new();
static BACKGROUND_CONTEXT: OnceLock<ExecutionContext> = OnceLock::new();

struct Inner {
    queue: NativeQueue,
    key: Option<QueueKey>,
    is_main: bool,
}

/// A logical place where work runs.
///
/// Cheap to clone; clones are the same context. The underlying queue
/// stays alive while any clone, or any work still queued on it, holds it.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<Inner>,
}

/// The context of the designated main thread.
pub fn main_context() -> &'static ExecutionContext {
    MAIN_CONTEXT.get_or_init(|| ExecutionContext::adopt(executor::main()))
}

/// The concurrent pool at [`Qos::Default`].
pub fn concurrent_default_context() -> &'static ExecutionContext {
    DEFAULT_CONTEXT.get_or_init(|| ExecutionContext::adopt(executor::global(Qos::Default)))
}

/// The concurrent pool at [`Qos::Background`].
pub fn concurrent_background_context() -> &'static ExecutionContext {
    BACKGROUND_CONTEXT.get_or_init(|| ExecutionContext::adopt(executor::global(Qos::Background)))
}

impl ExecutionContext {
    pub fn main() -> &'static ExecutionContext {
        main_context()
    }

    pub fn concurrent_default() -> &'static ExecutionContext {
        concurrent_default_context()
    }

    pub fn concurrent_background() -> &'static ExecutionContext {
        concurrent_background_context()
    }

    /// Wraps a queue this context does not own.
    ///
    /// No identity key is installed, so `is_current` is only ever true for
    /// a wrapped main queue called from the main thread.
    pub fn wrap(queue: NativeQueue) -> Self {
        let is_main = queue.is_main();
        Self::from_parts(queue, None, is_main)
    }

    /// Creates a new serial context with its own thread.
    ///
    /// # Panics
    ///
    /// If the OS refuses to start the thread. Use [`try_create`] to handle
    /// that case.
    ///
    /// [`try_create`]: ExecutionContext::try_create
    pub fn create(name: Option<&str>, qos: Qos) -> Self {
        Self::try_create(name, qos).expect("platform failed to start a serial context")
    }

    pub fn try_create(name: Option<&str>, qos: Qos) -> Result<Self> {
        let key = QueueKey::next();
        let queue = NativeQueue::try_serial_with(
            name.unwrap_or(""),
            qos,
            Some(key),
            crate::config::current(),
        )?;
        Ok(Self::from_parts(queue, Some(key), false))
    }

    // Shares the key the platform installed on a process-wide queue.
    fn adopt(queue: NativeQueue) -> Self {
        let key = queue.key();
        let is_main = queue.is_main();
        Self::from_parts(queue, key, is_main)
    }

    fn from_parts(queue: NativeQueue, key: Option<QueueKey>, is_main: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue,
                key,
                is_main,
            }),
        }
    }

    /// True if the caller runs inside work scheduled on this context, or
    /// this is the main context and the caller is on the main thread.
    pub fn is_current(&self) -> bool {
        if let Some(key) = self.inner.key {
            if specific::current_key() == Some(key) {
                return true;
            }
        }
        self.inner.is_main && executor::is_main_thread()
    }

    /// Runs `work` inline if this context is current, otherwise enqueues
    /// it and returns without waiting.
    pub fn async_<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_current() {
            tracing::trace!(context = %self.label(), "async: running inline");
            work();
        } else {
            tracing::trace!(context = %self.label(), "async: enqueued");
            self.inner.queue.execute(work);
        }
    }

    /// Runs `work` on this context and returns its value once it finished.
    ///
    /// Inline if this context is current; otherwise the caller blocks while
    /// `work` runs on the context. A panic in `work` propagates to the
    /// caller either way.
    pub fn sync<'a, F, R>(&self, work: F) -> R
    where
        F: FnOnce() -> R + Send + 'a,
        R: Send + 'a,
    {
        if self.is_current() {
            tracing::trace!(context = %self.label(), "sync: running inline");
            work()
        } else {
            tracing::trace!(context = %self.label(), "sync: waiting on queue");
            self.inner.queue.execute_and_wait(work)
        }
    }

    /// Always enqueues `work`, even when this context is current.
    pub fn just_dispatch<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.queue.execute(work);
    }

    /// Always enqueues `work`, to run at exactly `qos` regardless of the
    /// context's own tier. The tier is what [`Qos::current`] reports inside
    /// `work`; the OS priority of the serving thread is left unchanged.
    pub fn just_dispatch_with_qos<F>(&self, qos: Qos, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.queue.execute_with_qos(qos, true, work);
    }

    /// Enqueues `work` no earlier than `delay` from now. Never inline; a
    /// zero delay behaves like [`just_dispatch`](Self::just_dispatch).
    pub fn after<F>(&self, delay: Duration, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let deadline = Instant::now() + delay.min(FAR_FUTURE);
        self.inner.queue.execute_at(deadline, work);
    }

    /// [`after`](Self::after) with the delay in (fractional) seconds.
    /// Zero, negative and NaN delays dispatch as soon as possible.
    pub fn after_secs<F>(&self, seconds: f64, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.after(delay_from_secs(seconds), work);
    }

    pub fn is_main(&self) -> bool {
        self.inner.is_main
    }

    pub fn label(&self) -> &str {
        self.inner.queue.label()
    }

    pub fn qos(&self) -> Qos {
        self.inner.queue.qos()
    }

    pub fn queue(&self) -> &NativeQueue {
        &self.inner.queue
    }

    /// True if both handles are the same context (not merely the same queue).
    pub fn ptr_eq(&self, other: &ExecutionContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

fn delay_from_secs(seconds: f64) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(seconds).unwrap_or(FAR_FUTURE)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("queue", &self.inner.queue)
            .field("tagged", &self.inner.key.is_some())
            .field("is_main", &self.inner.is_main)
            .finish()
    }
}
