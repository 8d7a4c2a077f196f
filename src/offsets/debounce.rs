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

//! Quiet-period queue: a value is released only after its key has seen no
//! new value for the configured delay.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Pending<V> {
    value: V,
    last_push: Instant,
}

/// Coalesces values per key until the key goes quiet.
///
/// Time is passed in explicitly so the timing contract can be tested without
/// sleeping.
#[derive(Debug)]
pub struct Debouncer<K, V> {
    delay: Duration,
    pending: HashMap<K, Pending<V>>,
}

impl<K: Eq + Hash + Clone, V> Debouncer<K, V> {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: HashMap::new() }
    }

    /// Queue `value` for `key`, replacing any pending one and restarting the
    /// quiet period.
    pub fn push(&mut self, key: K, value: V, now: Instant) {
        self.pending.insert(key, Pending { value, last_push: now });
    }

    /// Take every value whose key has been quiet for at least the delay.
    pub fn due(&mut self, now: Instant) -> Vec<(K, V)> {
        let ready: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, pending)| now.saturating_duration_since(pending.last_push) >= self.delay)
            .map(|(key, _)| key.clone())
            .collect();
        ready
            .into_iter()
            .filter_map(|key| self.pending.remove(&key).map(|pending| (key, pending.value)))
            .collect()
    }

    /// Take the pending value for one key regardless of timing.
    pub fn flush_key(&mut self, key: &K) -> Option<V> {
        self.pending.remove(key).map(|pending| pending.value)
    }

    /// Take everything regardless of timing.
    pub fn flush(&mut self) -> Vec<(K, V)> {
        self.pending.drain().map(|(key, pending)| (key, pending.value)).collect()
    }

    /// Earliest instant at which [`Self::due`] will release something.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|pending| pending.last_push + self.delay).min()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
