//! Delayed submission.
//!
//! One lazily started thread keeps pending submissions in a min-heap keyed
//! by deadline and hands each one to its target queue once the deadline has
//! passed. Submissions sharing a deadline fire in the order they were made.

use super::task::Task;
use super::NativeQueue;
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Instant;

struct Entry {
    deadline: Instant,
    seq: u64,
    target: NativeQueue,
    task: Task,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the earliest deadline sits at the top of the max-heap.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct TimerState {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

pub(crate) struct Timer {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

static GLOBAL_TIMER: OnceLock<Arc<Timer>> = OnceLock::new();

impl Timer {
    fn new() -> Self {
        Self {
            state: Mutex::new(TimerState::default()),
            wakeup: Condvar::new(),
        }
    }

    /// The process-wide timer, starting its thread on first use.
    pub fn global() -> &'static Timer {
        GLOBAL_TIMER.get_or_init(|| {
            let timer = Arc::new(Timer::new());
            let runner = timer.clone();
            let name = format!("{}-timer", crate::config::current().thread_name_prefix);
            thread::Builder::new()
                .name(name)
                .spawn(move || runner.run())
                .expect("platform failed to start the timer thread");
            timer
        })
    }

    /// Hands `task` to `target` no earlier than `deadline`. A deadline that
    /// has already passed goes straight to the queue.
    pub fn schedule(&self, deadline: Instant, target: NativeQueue, task: Task) {
        if deadline <= Instant::now() {
            target.submit(task);
            return;
        }

        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;

        let wake = state
            .heap
            .peek()
            .map_or(true, |earliest| deadline < earliest.deadline);

        state.heap.push(Entry {
            deadline,
            seq,
            target,
            task,
        });
        drop(state);

        if wake {
            self.wakeup.notify_one();
        }
    }

    fn run(&self) {
        tracing::debug!("timer thread started");

        let mut state = self.state.lock();
        loop {
            let now = Instant::now();
            let mut due = Vec::new();
            while state
                .heap
                .peek()
                .map_or(false, |earliest| earliest.deadline <= now)
            {
                if let Some(entry) = state.heap.pop() {
                    due.push(entry);
                }
            }

            if !due.is_empty() {
                // Submit without holding the lock; targets may schedule again.
                drop(state);
                for entry in due {
                    entry.target.submit(entry.task);
                }
                state = self.state.lock();
                continue;
            }

            match state.heap.peek().map(|earliest| earliest.deadline) {
                Some(deadline) => {
                    self.wakeup.wait_until(&mut state, deadline);
                }
                None => self.wakeup.wait(&mut state),
            }
        }
    }
}
