// =====
// TESTS: 13
// =====
//
// History loader integration tests.
// Drives the loader against the in-memory remote and checks the resulting
// sequences, viewport and events.

use message_viewport::config::LOCAL_ID_FLOOR;
use message_viewport::history::{Direction, HistoryMessage, HistoryUpdate, SequenceKind};
use message_viewport::loader::memory::MemoryHistorySource;
use message_viewport::loader::{LoadOutcome, LoaderEvent};
use pretty_assertions::assert_eq;
use std::time::Duration;

use crate::helpers::{Harness, config, range, thread};

fn generated(count: usize) -> MemoryHistorySource {
    MemoryHistorySource::new().with_generated(&thread(), count)
}

// --- Opening at the tail ---

#[tokio::test]
async fn open_at_tail_fetches_newest_page() {
    let h = Harness::new(config(10), generated(200));

    let outcome = h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;

    assert_eq!(outcome, LoadOutcome::Fetched { count: 20 });
    assert_eq!(h.listed_ids(), range(181, 200));
    assert_eq!(h.viewport_ids(), range(191, 200));
    let history = h.history();
    assert_eq!(history.total_count, Some(200));
    assert!(history.is_viewport_newest());
    assert!(!history.is_loading);
}

#[tokio::test]
async fn backwards_scroll_uses_local_ids_then_fetches_older() {
    let h = Harness::new(config(10), generated(200));
    h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;

    let local = h.loader.ensure_viewport(&thread(), Some(191), Direction::Backwards, false).await;
    assert_eq!(local, LoadOutcome::Local);
    assert_eq!(h.viewport_ids(), range(181, 200));

    let fetched = h.loader.ensure_viewport(&thread(), Some(181), Direction::Backwards, false).await;
    assert_eq!(fetched, LoadOutcome::Fetched { count: 20 });
    assert_eq!(h.listed_ids(), range(161, 200));
    assert_eq!(h.viewport_ids(), range(171, 190));
    assert!(!h.history().is_viewport_newest());
}

#[tokio::test]
async fn budget_pass_preloads_without_moving_viewport() {
    let mut h = Harness::new(config(10), generated(200));
    h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;
    h.loader.ensure_viewport(&thread(), Some(191), Direction::Backwards, false).await;

    h.wait_until(|history| history.listed.first() == Some(161)).await;

    assert_eq!(h.viewport_ids(), range(181, 200));
    assert!(
        h.source.requests().iter().any(|request| request.reference_id == Some(181)),
        "budget pass should ask for the page before 181"
    );
}

// --- Request shaping ---

#[tokio::test]
async fn concurrent_requests_share_one_fetch() {
    let h = Harness::new(config(10), generated(200).with_latency(Duration::from_millis(30)));

    let thread = thread();

    let (first, second) = tokio::join!(
        h.loader.ensure_viewport(&thread, None, Direction::Around, false),
        h.loader.ensure_viewport(&thread, None, Direction::Around, false),
    );

    assert_eq!(first, LoadOutcome::Fetched { count: 20 });
    assert_eq!(second, LoadOutcome::Coalesced);
    assert_eq!(h.source.fetch_count(), 1);
}

#[tokio::test]
async fn request_parked_behind_budget_fetch_is_republished() {
    let mut h = Harness::new(config(10), generated(200).with_latency(Duration::from_millis(50)));
    h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;
    h.loader.ensure_viewport(&thread(), Some(191), Direction::Backwards, false).await;
    // Let the budget pass start its fetch for the page before 181.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let outcome = h.loader.ensure_viewport(&thread(), Some(181), Direction::Backwards, false).await;
    assert_eq!(outcome, LoadOutcome::Coalesced);
    assert_eq!(h.viewport_ids(), range(181, 190));

    h.wait_until(|history| history.listed.first() == Some(161)).await;

    assert_eq!(h.viewport_ids(), range(171, 190));
    assert!(!h.history().is_loading);
}

#[tokio::test]
async fn nothing_is_fetched_before_the_oldest_message() {
    let h = Harness::new(config(10), generated(15));
    h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;
    assert!(h.history().reached_oldest);
    assert_eq!(h.listed_ids(), range(1, 15));

    let outcome = h.loader.ensure_viewport(&thread(), Some(6), Direction::Backwards, false).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(outcome, LoadOutcome::Skipped);
    assert_eq!(h.viewport_ids(), range(1, 15));
    assert_eq!(h.source.fetch_count(), 1);
}

#[tokio::test]
async fn local_tail_is_never_fetched_around() {
    let h = Harness::new(config(10), generated(200));
    h.store.update(
        &thread(),
        HistoryUpdate::Merge {
            ids: vec![1, 2, 3, LOCAL_ID_FLOOR + 1],
            into: SequenceKind::Listed,
            reached_newest: true,
            total_count: None,
        },
    );

    let at_tail = h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;
    let at_local = h
        .loader
        .ensure_viewport(&thread(), Some(LOCAL_ID_FLOOR + 1), Direction::Around, false)
        .await;

    assert_eq!(at_tail, LoadOutcome::Skipped);
    assert_eq!(at_local, LoadOutcome::Skipped);
    assert_eq!(h.source.fetch_count(), 0);
    assert!(!h.history().is_loading);
}

#[tokio::test]
async fn failed_fetch_leaves_sequences_untouched() {
    let mut h = Harness::new(config(10), generated(200).with_fail_every(1));

    let outcome = h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;

    assert_eq!(outcome, LoadOutcome::Failed);
    assert!(h.listed_ids().is_empty());
    assert!(h.viewport_ids().is_empty());
    assert!(!h.history().is_loading);
    let events = h.drain_events();
    assert!(events.contains(&LoaderEvent::FetchFailed { thread: thread(), direction: Direction::Around }));
}

// --- Jumps and outlying history ---

#[tokio::test]
async fn jump_near_listed_converges_into_listed() {
    let h = Harness::new(config(25), generated(200));
    h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;
    assert_eq!(h.listed_ids(), range(151, 200));

    let outcome = h.loader.ensure_viewport(&thread(), Some(140), Direction::Around, false).await;

    assert_eq!(outcome, LoadOutcome::Fetched { count: 50 });
    assert_eq!(h.listed_ids(), range(116, 200));
    assert_eq!(h.outlying_ids(), None);
    let history = h.history();
    assert_eq!(history.viewport.source, SequenceKind::Listed);
    assert_eq!(h.viewport_ids(), range(116, 164));
}

#[tokio::test]
async fn disjoint_jump_builds_outlying_run() {
    let h = Harness::new(config(10), generated(200));
    h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;

    h.loader.ensure_viewport(&thread(), Some(50), Direction::Around, false).await;

    assert_eq!(h.listed_ids(), range(181, 200));
    assert_eq!(h.outlying_ids(), Some(range(41, 60)));
    assert_eq!(h.viewport_ids(), range(41, 59));
    assert_eq!(h.history().viewport.source, SequenceKind::Outlying);
    assert!(!h.history().is_viewport_newest());

    let forwards = h.loader.ensure_viewport(&thread(), Some(59), Direction::Forwards, false).await;
    assert_eq!(forwards, LoadOutcome::Fetched { count: 21 });
    assert_eq!(h.outlying_ids(), Some(range(41, 79)));
    assert_eq!(h.viewport_ids(), range(50, 69));

    h.loader.ensure_viewport(&thread(), Some(120), Direction::Around, false).await;
    assert_eq!(h.outlying_ids(), Some(range(111, 130)));
    assert_eq!(h.listed_ids(), range(181, 200));
}

#[tokio::test]
async fn outlying_run_reaching_newest_becomes_listed() {
    let h = Harness::new(config(10), generated(30));

    h.loader.ensure_viewport(&thread(), Some(25), Direction::Around, false).await;

    assert_eq!(h.outlying_ids(), None);
    assert_eq!(h.listed_ids(), range(11, 30));
    assert_eq!(h.history().viewport.source, SequenceKind::Listed);
}

// --- Thread lifecycle ---

#[tokio::test]
async fn result_for_closed_thread_is_discarded() {
    let h = Harness::new(config(10), generated(200).with_latency(Duration::from_millis(40)));

    let thread = thread();

    let (outcome, ()) = tokio::join!(
        h.loader.ensure_viewport(&thread, None, Direction::Around, false),
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            h.store.close_thread(&thread);
        },
    );

    assert_eq!(outcome, LoadOutcome::Stale);
    assert!(h.listed_ids().is_empty());
    assert!(h.viewport_ids().is_empty());
}

#[tokio::test]
async fn arrivals_and_deletions_update_the_viewport() {
    let h = Harness::new(config(10), generated(200));
    h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;

    let message = h.source.post(&thread(), "bo", "hello");
    h.loader.message_arrived(&thread(), message);
    assert_eq!(h.viewport_ids().last(), Some(&201));
    assert_eq!(h.listed_ids().last(), Some(&201));

    h.loader.messages_deleted(&thread(), &[195, 201]);
    assert!(!h.viewport_ids().contains(&195));
    assert_eq!(h.listed_ids().last(), Some(&200));

    let local = LOCAL_ID_FLOOR + 1;
    h.loader.message_arrived(&thread(), HistoryMessage::new(local, "me", "hi", 0));
    h.loader.local_confirmed(&thread(), local, 202);
    assert_eq!(h.viewport_ids().last(), Some(&202));
    assert!(!h.viewport_ids().contains(&local));
    assert_eq!(h.store.message(&thread(), 202).map(|m| m.text.clone()), Some("hi".to_owned()));
}
