// =====
// TESTS: 4
// =====
//
// State file integration tests.
// Saves the store, loads it into a fresh one and reopens the thread against a
// remote that moved on in the meantime.

use message_viewport::history::{Direction, HistoryStore};
use message_viewport::loader::LoadOutcome;
use message_viewport::loader::memory::MemoryHistorySource;
use pretty_assertions::assert_eq;

use crate::helpers::{Harness, config, range, thread};

#[tokio::test]
async fn reopen_restores_cached_tail_and_offset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let h = Harness::new(config(10), MemoryHistorySource::new().with_generated(&thread(), 200));
    h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;
    h.store.set_scroll_offset(&thread(), 42.0);
    h.store.close_thread(&thread());
    h.store.save(&path).expect("save state");

    let restored = HistoryStore::load(&path, config(10)).expect("load state");
    let reopened =
        Harness::with_store(restored, MemoryHistorySource::new().with_generated(&thread(), 200));

    assert_eq!(reopened.listed_ids(), range(181, 200));
    assert!(reopened.viewport_ids().is_empty());
    assert_eq!(reopened.store.scroll_offset(&thread()), Some(42.0));
}

#[tokio::test]
async fn restored_history_renders_with_bodies() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let h = Harness::new(config(10), MemoryHistorySource::new().with_generated(&thread(), 200));
    h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;
    h.loader.ensure_viewport(&thread(), Some(191), Direction::Backwards, false).await;
    h.loader.ensure_viewport(&thread(), Some(181), Direction::Backwards, false).await;
    assert_eq!(h.listed_ids(), range(161, 200));
    h.store.close_thread(&thread());
    h.store.save(&path).expect("save state");

    let restored = HistoryStore::load(&path, config(10)).expect("load state");
    let reopened =
        Harness::with_store(restored, MemoryHistorySource::new().with_generated(&thread(), 200));
    let outcome =
        reopened.loader.ensure_viewport(&thread(), Some(181), Direction::Backwards, false).await;

    assert_eq!(outcome, LoadOutcome::Local);
    assert_eq!(reopened.viewport_ids(), range(171, 190));
    for id in reopened.viewport_ids() {
        assert!(reopened.store.message(&thread(), id).is_some(), "no body for restored id {id}");
    }
    assert_eq!(reopened.source.fetch_count(), 0);
}

#[tokio::test]
async fn stale_cached_tail_is_replaced_by_live_tail() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let h = Harness::new(config(10), MemoryHistorySource::new().with_generated(&thread(), 200));
    h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;
    h.store.close_thread(&thread());
    h.store.save(&path).expect("save state");

    // A hundred messages arrived while the thread was closed.
    let restored = HistoryStore::load(&path, config(10)).expect("load state");
    let reopened =
        Harness::with_store(restored, MemoryHistorySource::new().with_generated(&thread(), 300));
    assert_eq!(reopened.source.first_after(&thread(), 200), Some(201));

    let outcome = reopened.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;

    assert_eq!(outcome, LoadOutcome::Fetched { count: 20 });
    assert_eq!(reopened.listed_ids(), range(281, 300));
    assert_eq!(reopened.viewport_ids(), range(291, 300));
}

#[tokio::test]
async fn missing_state_file_starts_empty() {
    let dir = tempfile::tempdir().expect("tempdir");

    let store = HistoryStore::load(&dir.path().join("absent.json"), config(10)).expect("load state");

    assert!(store.snapshot(&thread()).is_none());
    assert_eq!(store.scroll_offset(&thread()), None);
}
