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

//! Sorted, duplicate-free runs of message ids.
//!
//! An [`IdSequence`] is cheap to clone: the ids live behind an `Arc` and are
//! only copied when a clone is mutated, so store readers can keep a snapshot
//! while the loader builds the next one.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// Server-assigned message id, unique within a thread and increasing with send
/// order. Ids at or above [`crate::config::LOCAL_ID_FLOOR`] are local.
pub type MessageId = i64;

/// Ascending run of contiguous known history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<MessageId>", into = "Vec<MessageId>")]
pub struct IdSequence {
    ids: Arc<Vec<MessageId>>,
}

impl IdSequence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sequence from ids in any order, dropping duplicates.
    pub fn from_unsorted(ids: impl IntoIterator<Item = MessageId>) -> Self {
        let mut ids: Vec<MessageId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self { ids: Arc::new(ids) }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[MessageId] {
        &self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<MessageId> {
        self.ids.first().copied()
    }

    #[must_use]
    pub fn last(&self) -> Option<MessageId> {
        self.ids.last().copied()
    }

    #[must_use]
    pub fn contains(&self, id: MessageId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Whether `id` falls between the first and last id, present or not.
    #[must_use]
    pub fn spans(&self, id: MessageId) -> bool {
        matches!((self.first(), self.last()), (Some(first), Some(last)) if first <= id && id <= last)
    }

    /// Whether both sequences share at least one id.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        are_sorted_intersecting(&self.ids, &other.ids)
    }

    /// Union `update` into this sequence. Returns `false` when nothing changed,
    /// in which case the shared buffer is left untouched.
    pub fn merge(&mut self, update: &[MessageId]) -> bool {
        let mut fresh: Vec<MessageId> =
            update.iter().copied().filter(|id| self.ids.binary_search(id).is_err()).collect();
        if fresh.is_empty() {
            return false;
        }
        fresh.sort_unstable();
        fresh.dedup();
        let merged = merge_sorted(&self.ids, &fresh);
        self.ids = Arc::new(merged);
        true
    }

    /// Drop every id in `removed`. Returns `false` when none were present.
    pub fn remove_all(&mut self, removed: &[MessageId]) -> bool {
        if !removed.iter().any(|id| self.contains(*id)) {
            return false;
        }
        Arc::make_mut(&mut self.ids).retain(|id| !removed.contains(id));
        true
    }

    /// Swap `from` for `to`, keeping the sequence sorted.
    pub fn replace(&mut self, from: MessageId, to: MessageId) -> bool {
        if !self.contains(from) {
            return false;
        }
        let ids = Arc::make_mut(&mut self.ids);
        ids.retain(|id| *id != from);
        if let Err(pos) = ids.binary_search(&to) {
            ids.insert(pos, to);
        }
        true
    }

    /// Sub-slice by index, clamped to the sequence bounds.
    #[must_use]
    pub fn window(&self, from: usize, to_exclusive: usize) -> &[MessageId] {
        let end = to_exclusive.min(self.ids.len());
        let start = from.min(end);
        &self.ids[start..end]
    }
}

impl From<Vec<MessageId>> for IdSequence {
    fn from(ids: Vec<MessageId>) -> Self {
        Self::from_unsorted(ids)
    }
}

impl From<IdSequence> for Vec<MessageId> {
    fn from(sequence: IdSequence) -> Self {
        Arc::unwrap_or_clone(sequence.ids)
    }
}

impl<const N: usize> From<[MessageId; N]> for IdSequence {
    fn from(ids: [MessageId; N]) -> Self {
        Self::from_unsorted(ids)
    }
}

impl FromIterator<MessageId> for IdSequence {
    fn from_iter<I: IntoIterator<Item = MessageId>>(iter: I) -> Self {
        Self::from_unsorted(iter)
    }
}

/// Two-pointer intersection test over ascending slices.
#[must_use]
pub fn are_sorted_intersecting(a: &[MessageId], b: &[MessageId]) -> bool {
    let (Some(a_first), Some(a_last), Some(b_first), Some(b_last)) =
        (a.first(), a.last(), b.first(), b.last())
    else {
        return false;
    };
    if a_last < b_first || b_last < a_first {
        return false;
    }

    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => return true,
        }
    }
    false
}

/// Merge two ascending, duplicate-free slices into one.
#[must_use]
pub fn merge_sorted(a: &[MessageId], b: &[MessageId]) -> Vec<MessageId> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                merged.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                merged.push(b[j]);
                j += 1;
            }
            Ordering::Equal => {
                merged.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);
    merged
}
