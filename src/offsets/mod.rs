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

//! Scroll-Offset Store.
//!
//! Every scroll updates an in-memory value at once; the shared store only sees
//! the offset after scrolling has been quiet for the debounce period.

mod debounce;

pub use debounce::Debouncer;

use crate::history::{HistoryStore, ThreadKey};
use std::collections::HashMap;
use std::time::Instant;

pub struct ScrollOffsetStore {
    store: HistoryStore,
    live: HashMap<ThreadKey, f64>,
    pending: Debouncer<ThreadKey, f64>,
}

impl ScrollOffsetStore {
    #[must_use]
    pub fn new(store: HistoryStore) -> Self {
        let delay = store.config().scroll_debounce;
        Self { store, live: HashMap::new(), pending: Debouncer::new(delay) }
    }

    /// Record a raw scroll offset. Non-finite values are dropped.
    pub fn persist_offset(&mut self, key: &ThreadKey, offset: f64, now: Instant) {
        if !offset.is_finite() {
            tracing::warn!(thread = %key, offset, "ignoring non-finite scroll offset");
            return;
        }
        let offset = offset.max(0.0);
        self.live.insert(key.clone(), offset);
        self.pending.push(key.clone(), offset, now);
    }

    /// Committed offset, as seen by a thread that is being mounted.
    #[must_use]
    pub fn read_offset(&self, key: &ThreadKey) -> Option<f64> {
        self.store.scroll_offset(key)
    }

    /// Latest offset including values not yet committed.
    #[must_use]
    pub fn live_offset(&self, key: &ThreadKey) -> Option<f64> {
        self.live.get(key).copied().or_else(|| self.read_offset(key))
    }

    /// Commit offsets whose thread stopped scrolling. Returns how many.
    pub fn commit_due(&mut self, now: Instant) -> usize {
        let due = self.pending.due(now);
        let count = due.len();
        for (key, offset) in due {
            self.commit(&key, offset);
        }
        count
    }

    /// Commit one thread right away, e.g. when it is being closed.
    pub fn flush_thread(&mut self, key: &ThreadKey) {
        if let Some(offset) = self.pending.flush_key(key) {
            self.commit(key, offset);
        }
        self.live.remove(key);
    }

    /// Commit everything right away.
    pub fn flush(&mut self) {
        for (key, offset) in self.pending.flush() {
            self.commit(&key, offset);
        }
        self.live.clear();
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.next_deadline()
    }

    fn commit(&self, key: &ThreadKey, offset: f64) {
        tracing::trace!(thread = %key, offset, "scroll offset committed");
        self.store.set_scroll_offset(key, offset);
    }
}
