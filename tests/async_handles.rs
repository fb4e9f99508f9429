use std::sync::Arc;
use std::time::{Duration, Instant};

use event_waiter::{EventWaiter, WaitOutcome};

#[derive(Debug, Clone, PartialEq)]
struct Reaction {
    message_id: u64,
    emoji: &'static str,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handle_can_be_awaited() {
    let waiter = Arc::new(EventWaiter::named("async-await").unwrap());
    let handle = waiter
        .wait_for(
            |r: &Reaction| r.message_id == 42,
            |r: &Reaction| r.emoji,
            Duration::from_secs(5),
        )
        .unwrap();

    let source = Arc::clone(&waiter);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        source.dispatch(&Reaction { message_id: 7, emoji: "x" });
        source.dispatch(&Reaction { message_id: 42, emoji: "check" });
    });

    assert_eq!(handle.await.unwrap(), WaitOutcome::Matched("check"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn awaited_timeout_yields_sentinel() {
    let waiter = EventWaiter::named("async-timeout").unwrap();
    let start = Instant::now();
    let handle = waiter
        .wait_for_event(|r: &Reaction| r.message_id == 1, Duration::from_millis(100))
        .unwrap();

    let outcome = handle.await.unwrap();
    assert_eq!(outcome, WaitOutcome::TimedOut);
    assert!(outcome.into_matched().is_none());
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handles_work_inside_select() {
    let waiter = EventWaiter::named("async-select").unwrap();
    let first = waiter
        .wait_for_event(|r: &Reaction| r.emoji == "a", Duration::from_secs(5))
        .unwrap();
    let second = waiter
        .wait_for_event(|r: &Reaction| r.emoji == "b", Duration::from_secs(5))
        .unwrap();

    waiter.dispatch(&Reaction { message_id: 1, emoji: "b" });

    tokio::select! {
        _ = first => panic!("only the second wait matches"),
        out = second => {
            assert_eq!(out.unwrap(), WaitOutcome::Matched(Reaction { message_id: 1, emoji: "b" }));
        }
    }

    // The dropped handle's wait is still in the registry until it resolves.
    assert_eq!(waiter.pending_for::<Reaction>(), 1);
}
