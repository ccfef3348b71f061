//! Stress tests for execution contexts

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use strand_rs::prelude::*;

#[test]
#[ignore] // Run with --ignored flag
fn stress_test_many_small_dispatches() {
    let ctx = ExecutionContext::create(Some("stress-small"), Qos::Default);
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..100_000 {
        let counter = counter.clone();
        ctx.async_(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }
    ctx.sync(|| {});

    assert_eq!(counter.load(Ordering::Relaxed), 100_000);
}

#[test]
#[ignore]
fn stress_test_reentrant_sync_chains() {
    let lanes: Vec<_> = (0..8)
        .map(|i| ExecutionContext::create(Some(&format!("chain-{}", i)), Qos::Default))
        .collect();
    let lanes = Arc::new(lanes);

    // Each step hops to the next lane and syncs back onto itself, which
    // only works because the second sync runs inline.
    fn hop(lanes: Arc<Vec<ExecutionContext>>, depth: usize) -> usize {
        if depth == lanes.len() {
            return depth;
        }
        let lane = lanes[depth].clone();
        let again = lane.clone();
        lane.sync(move || again.sync(move || hop(lanes, depth + 1)))
    }

    for _ in 0..1_000 {
        assert_eq!(hop(lanes.clone(), 0), 8);
    }
}

#[test]
#[ignore]
fn stress_test_many_producers_one_lane() {
    let ctx = ExecutionContext::create(Some("stress-mpsc"), Qos::Default);
    let total = Arc::new(Mutex::new(0u64));

    let producers: Vec<_> = (0..16)
        .map(|_| {
            let ctx = ctx.clone();
            let total = total.clone();
            thread::spawn(move || {
                for i in 0..10_000u64 {
                    let total = total.clone();
                    if i % 2 == 0 {
                        ctx.async_(move || *total.lock() += 1);
                    } else {
                        ctx.sync(move || *total.lock() += 1);
                    }
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    ctx.sync(|| {});

    assert_eq!(*total.lock(), 160_000);
}

#[test]
#[ignore]
fn stress_test_many_timers() {
    let ctx = concurrent_default_context();
    let counter = Arc::new(AtomicUsize::new(0));

    for i in 0..10_000u64 {
        let counter = counter.clone();
        ctx.after(Duration::from_micros(i % 500), move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while counter.load(Ordering::Relaxed) < 10_000 && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(counter.load(Ordering::Relaxed), 10_000);
}

#[test]
#[ignore]
fn stress_test_create_and_drop_contexts() {
    for i in 0..500 {
        let ctx = ExecutionContext::create(Some("churn"), Qos::Background);
        assert_eq!(ctx.sync(move || i), i);
    }
}
