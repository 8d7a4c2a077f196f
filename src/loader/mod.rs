// message_viewport — Scroll-stable chat history viewport
// Copyright (C) 2025  Simon Peter Rothgang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! History Loader: fills viewport gaps from the remote source.
//!
//! A request first resolves against local ids and publishes whatever part of
//! the window already exists. Only then does it fetch, merge the page into the
//! right sequence and republish. Non-budget requests schedule one background
//! "budget" pass that preloads the next page past the viewport edge.

pub mod memory;
mod source;

pub use source::{FetchRequest, FetchResult, HistorySource, fetch_request};

use crate::history::{
    Direction, HistoryMessage, HistoryStore, HistoryUpdate, MessageId, SequenceKind,
    ThreadHistory, ThreadKey, are_sorted_intersecting, resolve_slice,
};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// Notifications for whoever renders the viewport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderEvent {
    /// The thread's viewport, loading flag or sequences changed.
    ViewportChanged { thread: ThreadKey },
    /// A fetch failed. Sequences are unchanged; the next trigger retries.
    FetchFailed { thread: ThreadKey, direction: Direction },
    /// A budget pass finished, whether or not it fetched anything.
    BudgetSettled { thread: ThreadKey, direction: Direction },
}

/// What a single `ensure_viewport` call ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The window was fully satisfied by local ids.
    Local,
    /// A page was fetched and merged.
    Fetched { count: usize },
    /// Another fetch for the same thread and direction was in flight.
    Coalesced,
    /// The fetch was skipped on purpose: a local reference, a local tail, or
    /// nothing older left to load.
    Skipped,
    /// The fetch failed or returned no data.
    Failed,
    /// The thread was closed or reopened while the fetch was in flight.
    Stale,
    /// The thread is not mounted.
    NotOpen,
}

type InFlightKey = (ThreadKey, Direction);

/// A user request that arrived while a fetch for the same key was running.
/// The running fetch republishes the viewport for it once it merges.
#[derive(Debug, Clone, Copy)]
struct Waiting {
    reference: Option<MessageId>,
}

type InFlightMap = Arc<Mutex<HashMap<InFlightKey, Option<Waiting>>>>;

struct LoaderInner {
    store: HistoryStore,
    source: Arc<dyn HistorySource>,
    in_flight: InFlightMap,
    events: mpsc::UnboundedSender<LoaderEvent>,
}

/// Cheap-to-clone handle; clones share in-flight bookkeeping.
#[derive(Clone)]
pub struct HistoryLoader {
    inner: Arc<LoaderInner>,
}

/// Removes its key from the in-flight map when dropped.
struct InFlightGuard {
    map: InFlightMap,
    key: InFlightKey,
}

impl InFlightGuard {
    fn take_waiting(&self) -> Option<Waiting> {
        self.map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&self.key)
            .and_then(Option::take)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.map.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.key);
    }
}

impl HistoryLoader {
    pub fn new(
        store: HistoryStore,
        source: Arc<dyn HistorySource>,
    ) -> (Self, mpsc::UnboundedReceiver<LoaderEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let inner = LoaderInner { store, source, in_flight: Arc::default(), events };
        (Self { inner: Arc::new(inner) }, event_rx)
    }

    /// Make sure the viewport around `reference` is materialized, fetching the
    /// missing part if needed.
    pub async fn ensure_viewport(
        &self,
        thread: &ThreadKey,
        reference: Option<MessageId>,
        direction: Direction,
        is_budget: bool,
    ) -> LoadOutcome {
        let store = &self.inner.store;
        let config = *store.config();
        let Some(generation) = store.generation(thread) else {
            return LoadOutcome::NotOpen;
        };
        let Some(history) = store.snapshot(thread) else {
            return LoadOutcome::NotOpen;
        };

        let kind = history.sequence_for(reference);
        let local_ids = local_ids_for(&history, kind, reference);
        let slice = resolve_slice(&local_ids, reference, direction, config.window_size);

        if !is_budget {
            let published = store.modify(thread, Some(generation), |history, config| {
                let mut changed = false;
                if slice.is_partially_local {
                    changed |= history.apply(
                        HistoryUpdate::ReplaceViewport { ids: slice.ids.clone(), source: kind },
                        config,
                    );
                }
                let loading = !slice.is_fully_local && history.viewport.is_empty();
                changed |= history.apply(HistoryUpdate::SetLoading(loading), config);
                changed
            });
            if published == Some(true) {
                self.notify(LoaderEvent::ViewportChanged { thread: thread.clone() });
            }
        }

        if slice.is_fully_local {
            if !is_budget {
                self.spawn_budget_pass(thread, direction);
            }
            return LoadOutcome::Local;
        }

        if let Some(reference) = reference
            && config.is_local(reference)
        {
            tracing::debug!(thread = %thread, reference, "skipping fetch around a local message");
            return self.finish_skipped(thread, generation);
        }
        if direction == Direction::Around
            && reference.is_none()
            && history.listed.last().is_some_and(|last| config.is_local(last))
        {
            tracing::debug!(thread = %thread, "skipping around-last fetch behind a local tail");
            return self.finish_skipped(thread, generation);
        }
        if direction == Direction::Backwards
            && kind == SequenceKind::Listed
            && history.reached_oldest
            && slice.is_partially_local
        {
            tracing::debug!(thread = %thread, ?reference, "listed history already starts at the oldest");
            return self.finish_skipped(thread, generation);
        }

        let Some(guard) = self.try_begin(thread, direction, reference, is_budget) else {
            tracing::debug!(thread = %thread, ?direction, "coalesced with in-flight fetch");
            return LoadOutcome::Coalesced;
        };

        let request = fetch_request(thread, reference, direction, &config);
        let result = match self.inner.source.fetch_messages(request).await {
            Ok(Some(result)) => result,
            Ok(None) => {
                tracing::debug!(thread = %thread, ?direction, "fetch returned no data");
                return self.finish_failed(thread, generation, direction);
            }
            Err(err) => {
                tracing::warn!(thread = %thread, ?direction, "history fetch failed: {err:#}");
                return self.finish_failed(thread, generation, direction);
            }
        };

        if !store.is_current(thread, generation) {
            tracing::debug!(thread = %thread, "discarding fetch result for a closed thread");
            return LoadOutcome::Stale;
        }

        let count = result.messages.len();
        let mut fetched_ids: Vec<MessageId> = result.messages.iter().map(|m| m.id).collect();
        fetched_ids.sort_unstable();
        fetched_ids.dedup();
        store.insert_messages(thread, result.messages);

        let merged = store.modify(thread, Some(generation), |history, config| {
            let jumped_elsewhere = kind == SequenceKind::Outlying
                && reference.zip(history.outlying.as_ref()).is_some_and(|(reference, outlying)| {
                    !outlying.spans(reference)
                        && !are_sorted_intersecting(outlying.as_slice(), &fetched_ids)
                });
            if jumped_elsewhere {
                history.apply(HistoryUpdate::DropOutlying, config);
            }
            history.apply(
                HistoryUpdate::Merge {
                    ids: fetched_ids,
                    into: kind,
                    reached_newest: result.reached_newest,
                    total_count: result.total_count,
                },
                config,
            );
            if kind == SequenceKind::Listed && result.reached_oldest {
                history.apply(HistoryUpdate::ReachedOldest, config);
            }

            if !is_budget {
                let kind = if kind == SequenceKind::Outlying && history.outlying.is_none() {
                    SequenceKind::Listed
                } else {
                    kind
                };
                let ids = history.sequence(kind).map(|seq| seq.as_slice().to_vec()).unwrap_or_default();
                let slice = resolve_slice(&ids, reference, direction, config.window_size);
                history.apply(HistoryUpdate::ReplaceViewport { ids: slice.ids, source: kind }, config);
            }
            // The newest coalesced request wins over the one that fetched.
            if let Some(Waiting { reference }) = guard.take_waiting() {
                let kind = history.sequence_for(reference);
                let ids = history.sequence(kind).map(|seq| seq.as_slice().to_vec()).unwrap_or_default();
                let slice = resolve_slice(&ids, reference, direction, config.window_size);
                if slice.is_partially_local {
                    history.apply(HistoryUpdate::ReplaceViewport { ids: slice.ids, source: kind }, config);
                }
            }
            history.apply(HistoryUpdate::SetLoading(false), config);
        });

        if merged.is_none() {
            tracing::debug!(thread = %thread, "thread changed before merge, result dropped");
            return LoadOutcome::Stale;
        }

        tracing::debug!(thread = %thread, ?direction, count, is_budget, "merged history page");
        self.notify(LoaderEvent::ViewportChanged { thread: thread.clone() });
        if !is_budget {
            self.spawn_budget_pass(thread, direction);
        }
        LoadOutcome::Fetched { count }
    }

    // -----------------------------------------------------------------------
    // External insert/delete events
    // -----------------------------------------------------------------------

    /// A new message was delivered for `thread`.
    pub fn message_arrived(&self, thread: &ThreadKey, message: HistoryMessage) {
        let id = message.id;
        self.inner.store.insert_messages(thread, [message]);
        if self.inner.store.update(thread, HistoryUpdate::MessageArrived(id)) {
            self.notify(LoaderEvent::ViewportChanged { thread: thread.clone() });
        }
    }

    pub fn messages_deleted(&self, thread: &ThreadKey, ids: &[MessageId]) {
        if self.inner.store.delete_messages(thread, ids) {
            self.notify(LoaderEvent::ViewportChanged { thread: thread.clone() });
        }
    }

    /// The server acknowledged local message `local_id` as `server_id`.
    pub fn local_confirmed(&self, thread: &ThreadKey, local_id: MessageId, server_id: MessageId) {
        self.inner.store.rekey_message(thread, local_id, server_id);
        if self.inner.store.update(thread, HistoryUpdate::LocalConfirmed { local_id, server_id }) {
            self.notify(LoaderEvent::ViewportChanged { thread: thread.clone() });
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Claim the in-flight slot for `(thread, direction)`. When it is taken,
    /// a user request is parked on it and `None` is returned.
    fn try_begin(
        &self,
        thread: &ThreadKey,
        direction: Direction,
        reference: Option<MessageId>,
        is_budget: bool,
    ) -> Option<InFlightGuard> {
        let key = (thread.clone(), direction);
        let mut in_flight = self.inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(waiting) = in_flight.get_mut(&key) {
            if !is_budget {
                *waiting = Some(Waiting { reference });
            }
            return None;
        }
        in_flight.insert(key.clone(), None);
        drop(in_flight);
        Some(InFlightGuard { map: Arc::clone(&self.inner.in_flight), key })
    }

    /// Preload one more page past the edge of the viewport, after the current
    /// task yields.
    fn spawn_budget_pass(&self, thread: &ThreadKey, direction: Direction) {
        let Some(history) = self.inner.store.snapshot(thread) else {
            return;
        };
        let (reference, direction) = match direction {
            Direction::Backwards | Direction::Around => (history.viewport.first(), Direction::Backwards),
            Direction::Forwards => (history.viewport.last(), Direction::Forwards),
        };
        if reference.is_none() {
            return;
        }

        let loader = self.clone();
        let thread = thread.clone();
        let pass: BoxFuture<'static, ()> = Box::pin(async move {
            tokio::task::yield_now().await;
            let outcome = loader.ensure_viewport(&thread, reference, direction, true).await;
            tracing::trace!(thread = %thread, ?direction, ?outcome, "budget pass finished");
            loader.notify(LoaderEvent::BudgetSettled { thread, direction });
        });
        tokio::spawn(pass);
    }

    fn finish_skipped(&self, thread: &ThreadKey, generation: u64) -> LoadOutcome {
        self.clear_loading(thread, generation);
        LoadOutcome::Skipped
    }

    fn finish_failed(&self, thread: &ThreadKey, generation: u64, direction: Direction) -> LoadOutcome {
        self.clear_loading(thread, generation);
        self.notify(LoaderEvent::FetchFailed { thread: thread.clone(), direction });
        LoadOutcome::Failed
    }

    fn clear_loading(&self, thread: &ThreadKey, generation: u64) {
        let changed = self.inner.store.modify(thread, Some(generation), |history, config| {
            history.apply(HistoryUpdate::SetLoading(false), config)
        });
        if changed == Some(true) {
            self.notify(LoaderEvent::ViewportChanged { thread: thread.clone() });
        }
    }

    fn notify(&self, event: LoaderEvent) {
        // Nobody listening is fine; the store already holds the new state.
        let _ = self.inner.events.send(event);
    }
}

/// Ids a request around `reference` can be answered from locally. A jump
/// outside the current outlying run starts from nothing.
fn local_ids_for(
    history: &ThreadHistory,
    kind: SequenceKind,
    reference: Option<MessageId>,
) -> Vec<MessageId> {
    match (kind, history.sequence(kind)) {
        (SequenceKind::Listed, Some(listed)) => listed.as_slice().to_vec(),
        (SequenceKind::Outlying, Some(outlying))
            if reference.is_some_and(|reference| outlying.spans(reference)) =>
        {
            outlying.as_slice().to_vec()
        }
        _ => Vec::new(),
    }
}
