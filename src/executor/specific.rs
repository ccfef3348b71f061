//! Identity tags for current-queue detection.
//!
//! A queue may carry a [`QueueKey`]. While a platform thread runs work for
//! that queue, the key sits in a thread-local slot together with the work's
//! effective QoS. Keys come from a process-wide counter and are never
//! reused, so two queues never compare equal.

use super::qos::Qos;
use std::cell::Cell;
use std::marker::PhantomData;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Opaque identity token installed on a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueKey(NonZeroU64);

impl QueueKey {
    pub(crate) fn next() -> Self {
        let raw = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        // Starts at 1 and would need 2^64 queues to wrap.
        QueueKey(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }
}

thread_local! {
    static CURRENT_KEY: Cell<Option<QueueKey>> = const { Cell::new(None) };
    static CURRENT_QOS: Cell<Option<Qos>> = const { Cell::new(None) };
}

pub(crate) fn current_key() -> Option<QueueKey> {
    CURRENT_KEY.with(Cell::get)
}

pub(crate) fn current_qos() -> Option<Qos> {
    CURRENT_QOS.with(Cell::get)
}

/// Restores the previous tag when dropped. Not `Send`: it belongs to the
/// thread that entered.
pub(crate) struct Entered {
    prev_key: Option<QueueKey>,
    prev_qos: Option<Qos>,
    _not_send: PhantomData<*const ()>,
}

/// Marks the calling thread as running work for `key` at `qos`.
pub(crate) fn enter(key: Option<QueueKey>, qos: Qos) -> Entered {
    let prev_key = CURRENT_KEY.with(|slot| slot.replace(key));
    let prev_qos = CURRENT_QOS.with(|slot| slot.replace(Some(qos)));
    Entered {
        prev_key,
        prev_qos,
        _not_send: PhantomData,
    }
}

impl Drop for Entered {
    fn drop(&mut self) {
        CURRENT_KEY.with(|slot| slot.set(self.prev_key));
        CURRENT_QOS.with(|slot| slot.set(self.prev_qos));
    }
}
