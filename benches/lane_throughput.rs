//! Throughput of serial lanes and the concurrent pools

use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strand_rs::prelude::*;

fn drain(ctx: &ExecutionContext, tasks: usize) {
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..tasks {
        let counter = counter.clone();
        ctx.just_dispatch(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }
    while counter.load(Ordering::Relaxed) < tasks {
        std::thread::yield_now();
    }
}

fn bench_serial_lane(c: &mut Criterion) {
    let ctx = ExecutionContext::create(Some("bench-lane"), Qos::Default);

    c.bench_function("serial_lane_10k", |b| {
        b.iter(|| drain(&ctx, 10_000));
    });
}

fn bench_default_pool(c: &mut Criterion) {
    c.bench_function("default_pool_10k", |b| {
        b.iter(|| drain(concurrent_default_context(), 10_000));
    });
}

criterion_group!(benches, bench_serial_lane, bench_default_pool);
criterion_main!(benches);
