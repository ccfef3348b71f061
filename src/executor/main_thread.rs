//! The designated main thread and its queue.
//!
//! Rust has no built-in UI thread, so an application picks one with
//! [`install_main_thread`] and drives main-queue work from it through the
//! returned [`MainLoop`]. Work submitted before that is buffered.

use super::qos::Qos;
use super::specific::QueueKey;
use super::task::Task;
use super::worker::{QueueStats, Worker};
use crate::error::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

static MAIN_THREAD: OnceLock<ThreadId> = OnceLock::new();
static MAIN_QUEUE: OnceLock<MainQueue> = OnceLock::new();

enum Message {
    Run(Task),
    Wake,
}

pub(crate) struct MainQueue {
    worker: Worker,
    tx: Sender<Message>,
    rx: Receiver<Message>,
    stop_requested: Arc<AtomicBool>,
}

impl MainQueue {
    pub fn global() -> &'static MainQueue {
        MAIN_QUEUE.get_or_init(|| {
            let (tx, rx) = unbounded();
            let worker = Worker::new(
                Arc::from("main"),
                Qos::UserInteractive,
                Some(QueueKey::next()),
                crate::config::current(),
            );
            MainQueue {
                worker,
                tx,
                rx,
                stop_requested: Arc::new(AtomicBool::new(false)),
            }
        })
    }

    pub fn submit(&self, task: Task) {
        self.worker.counters.record_submit();
        // `rx` lives in the same static, so the channel never disconnects.
        let _ = self.tx.send(Message::Run(task));
    }

    pub fn key(&self) -> Option<QueueKey> {
        self.worker.key
    }

    pub fn qos(&self) -> Qos {
        self.worker.qos
    }

    pub fn label(&self) -> &str {
        &self.worker.label
    }

    pub fn stats(&self) -> QueueStats {
        self.worker.counters.snapshot()
    }
}

/// True if the calling thread is the designated main thread.
pub fn is_main_thread() -> bool {
    MAIN_THREAD
        .get()
        .map_or(false, |main| *main == thread::current().id())
}

/// Designates the calling thread as the process main thread.
///
/// Calling it again from the same thread returns another loop handle;
/// calling it from any other thread fails with
/// [`Error::MainThreadTaken`].
pub fn install_main_thread() -> Result<MainLoop> {
    let me = thread::current().id();
    let designated = *MAIN_THREAD.get_or_init(|| me);
    if designated != me {
        return Err(Error::MainThreadTaken(format!("{:?}", designated)));
    }

    tracing::debug!(thread = ?me, "main thread installed");

    Ok(MainLoop {
        queue: MainQueue::global(),
        _not_send: PhantomData,
    })
}

/// Drives main-queue work on the designated thread. Not `Send`.
pub struct MainLoop {
    queue: &'static MainQueue,
    _not_send: PhantomData<*const ()>,
}

impl MainLoop {
    /// Runs the work queued at the time of the call, without blocking.
    /// Work enqueued while pumping waits for the next call.
    pub fn pump(&self) -> usize {
        let backlog = self.queue.rx.len();
        let mut ran = 0;
        for _ in 0..backlog {
            match self.queue.rx.try_recv() {
                Ok(Message::Run(task)) => {
                    self.queue.worker.execute_task(task);
                    ran += 1;
                }
                Ok(Message::Wake) => {}
                Err(_) => break,
            }
        }
        ran
    }

    /// Runs main-queue work until [`StopHandle::stop`] is called.
    ///
    /// Only a stop requested after the loop has started ends it; a request
    /// made while no loop was running is discarded.
    pub fn run(&self) -> usize {
        self.clear_stop();
        let mut ran = 0;
        while !self.take_stop() {
            match self.queue.rx.recv() {
                Ok(Message::Run(task)) => {
                    self.queue.worker.execute_task(task);
                    ran += 1;
                }
                Ok(Message::Wake) => {}
                Err(_) => break,
            }
        }
        ran
    }

    /// Runs main-queue work for `duration`, or until a stop is requested.
    /// A duration too large to express as a deadline behaves like [`run`](Self::run).
    pub fn run_for(&self, duration: Duration) -> usize {
        let deadline = match Instant::now().checked_add(duration) {
            Some(deadline) => deadline,
            None => return self.run(),
        };

        self.clear_stop();
        let mut ran = 0;
        while !self.take_stop() {
            match self.queue.rx.recv_deadline(deadline) {
                Ok(Message::Run(task)) => {
                    self.queue.worker.execute_task(task);
                    ran += 1;
                }
                Ok(Message::Wake) => {}
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        ran
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop_requested: self.queue.stop_requested.clone(),
            tx: self.queue.tx.clone(),
        }
    }

    fn clear_stop(&self) {
        self.queue.stop_requested.store(false, Ordering::Release);
    }

    fn take_stop(&self) -> bool {
        self.queue.stop_requested.swap(false, Ordering::AcqRel)
    }
}

impl std::fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainLoop")
            .field("backlog", &self.queue.rx.len())
            .finish()
    }
}

/// Ends a running [`MainLoop::run`] from any thread.
#[derive(Clone)]
pub struct StopHandle {
    stop_requested: Arc<AtomicBool>,
    tx: Sender<Message>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        let _ = self.tx.send(Message::Wake);
    }
}

impl std::fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopHandle")
            .field("stop_requested", &self.stop_requested.load(Ordering::Relaxed))
            .finish()
    }
}
