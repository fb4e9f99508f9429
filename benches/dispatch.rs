use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use event_waiter::{EventWaiter, EventWaiterConfig};

struct Watched(u64);
struct Unwatched(u64);

fn make_waiter(workers: usize) -> EventWaiter {
    EventWaiter::new(EventWaiterConfig {
        workers,
        ..EventWaiterConfig::named("bench")
    })
    .unwrap()
}

fn bench_dispatch_idle_kind(c: &mut Criterion) {
    c.bench_function("dispatch/idle_kind", |b| {
        b.iter_custom(|iters| {
            let waiter = make_waiter(1);
            let start = Instant::now();
            for i in 0..iters {
                let _ = waiter.dispatch(&Unwatched(i));
            }
            start.elapsed()
        });
    });
}

fn bench_dispatch_non_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_non_matching");
    group.throughput(Throughput::Elements(1));

    group.bench_function("100_waiters", |b| {
        // Fresh waiters per sample; registration is excluded from timing.
        b.iter_custom(|iters| {
            let waiter = make_waiter(4);
            let handles: Vec<_> = (0..100)
                .map(|_| {
                    waiter
                        .wait_for(|e: &Watched| e.0 == u64::MAX, |e: &Watched| e.0, Duration::from_secs(60))
                        .unwrap()
                })
                .collect();

            let start = Instant::now();
            for i in 0..iters {
                let _ = waiter.dispatch(&Watched(i));
            }
            let elapsed = start.elapsed();

            for h in &handles {
                h.cancel();
            }
            elapsed
        });
    });
    group.finish();
}

fn bench_wait_match_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("wait_roundtrip");
    group.throughput(Throughput::Elements(1));

    group.bench_function("register_match_resolve", |b| {
        b.iter_custom(|iters| {
            let waiter = make_waiter(2);
            let start = Instant::now();
            for i in 0..iters {
                let h = waiter
                    .wait_for(move |e: &Watched| e.0 == i, |e: &Watched| e.0, Duration::from_secs(5))
                    .unwrap();
                waiter.dispatch(&Watched(i));
                let _ = h.wait().unwrap();
            }
            start.elapsed()
        });
    });
    group.finish();
}

criterion_group!(
    dispatch,
    bench_dispatch_idle_kind,
    bench_dispatch_non_matching,
    bench_wait_match_roundtrip
);
criterion_main!(dispatch);
