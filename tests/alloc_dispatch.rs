use std::alloc::System;
use std::time::Duration;

use stats_alloc::{Region, StatsAlloc, INSTRUMENTED_SYSTEM};

use event_waiter::EventWaiter;

#[global_allocator]
static GLOBAL: &StatsAlloc<System> = &INSTRUMENTED_SYSTEM;

struct Watched(u32);
struct Unwatched(u32);

#[test]
fn dispatch_to_kind_without_waiters_does_not_allocate() {
    let waiter = EventWaiter::named("alloc").unwrap();

    // Waits on another kind must not make unrelated dispatch more expensive.
    let _handle = waiter
        .wait_for(|e: &Watched| e.0 == u32::MAX, |e: &Watched| e.0, Duration::from_secs(30))
        .unwrap();

    // Warm up.
    for i in 0..16 {
        waiter.dispatch(&Unwatched(i));
    }

    let region = Region::new(GLOBAL);
    for i in 0..10_000 {
        assert_eq!(waiter.dispatch(&Unwatched(i)), 0);
    }
    let stats = region.change();

    // Budget is conservative to tolerate test-harness noise; per-call
    // allocation would show up as thousands.
    assert!(stats.allocations <= 16, "dispatch to an idle kind allocated: {stats:?}");
    assert_eq!(waiter.tracked_kinds(), 1);
    assert_eq!(waiter.pending(), 1);
}
