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

//! Per-thread history record and its single mutation entry point.
//!
//! A [`ThreadHistory`] only changes through [`ThreadHistory::apply`]; every
//! variant of [`HistoryUpdate`] keeps both id sequences sorted and unique and
//! keeps the viewport a sub-run of exactly one of them.

use super::ids::{IdSequence, MessageId};
use crate::config::ViewportConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifies one scrollable message list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadKey {
    pub chat_id: String,
    pub thread_id: i64,
}

/// The top-level list of a chat.
pub const MAIN_THREAD_ID: i64 = -1;

impl ThreadKey {
    pub fn new(chat_id: impl Into<String>, thread_id: i64) -> Self {
        Self { chat_id: chat_id.into(), thread_id }
    }

    pub fn main(chat_id: impl Into<String>) -> Self {
        Self::new(chat_id, MAIN_THREAD_ID)
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat_id, self.thread_id)
    }
}

/// Which id sequence a viewport or fetch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SequenceKind {
    /// Contiguous with the live tail of the thread.
    #[default]
    Listed,
    /// Loaded around a jump target, not yet known to touch `Listed`.
    Outlying,
}

/// Ids currently materialized for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    pub ids: Arc<[MessageId]>,
    pub source: SequenceKind,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { ids: Arc::from(Vec::new()), source: SequenceKind::Listed }
    }
}

impl Viewport {
    #[must_use]
    pub fn first(&self) -> Option<MessageId> {
        self.ids.first().copied()
    }

    #[must_use]
    pub fn last(&self) -> Option<MessageId> {
        self.ids.last().copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Everything the store keeps about one thread's history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadHistory {
    pub listed: IdSequence,
    pub outlying: Option<IdSequence>,
    pub viewport: Viewport,
    /// Server-reported number of messages in the thread, when known.
    pub total_count: Option<usize>,
    /// A fetch is pending and the viewport had nothing local to show.
    pub is_loading: bool,
    /// The listed run starts at the oldest message of the thread.
    pub reached_oldest: bool,
}

/// The only ways a [`ThreadHistory`] may change.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryUpdate {
    /// Fetched ids to union into one of the sequences.
    Merge {
        ids: Vec<MessageId>,
        into: SequenceKind,
        /// The remote reported there is nothing newer than this batch.
        reached_newest: bool,
        total_count: Option<usize>,
    },
    /// Publish a freshly resolved viewport.
    ReplaceViewport { ids: Vec<MessageId>, source: SequenceKind },
    /// Discard the outlying run, e.g. before jumping somewhere else.
    DropOutlying,
    SetLoading(bool),
    /// A listed merge reported that nothing older exists.
    ReachedOldest,
    /// A new message was delivered at the live tail.
    MessageArrived(MessageId),
    MessagesDeleted(Vec<MessageId>),
    /// The server acknowledged a local message under its real id.
    LocalConfirmed { local_id: MessageId, server_id: MessageId },
}

impl ThreadHistory {
    #[must_use]
    pub fn sequence(&self, kind: SequenceKind) -> Option<&IdSequence> {
        match kind {
            SequenceKind::Listed => Some(&self.listed),
            SequenceKind::Outlying => self.outlying.as_ref(),
        }
    }

    /// Sequence that should answer a request around `reference`.
    ///
    /// No reference means the live tail. A reference inside the listed run
    /// (present or between two listed ids) stays listed; anything else is an
    /// outlying jump.
    #[must_use]
    pub fn sequence_for(&self, reference: Option<MessageId>) -> SequenceKind {
        let Some(reference) = reference else {
            return SequenceKind::Listed;
        };
        if self.listed.spans(reference) {
            SequenceKind::Listed
        } else {
            SequenceKind::Outlying
        }
    }

    /// Whether the viewport ends at the newest listed id.
    #[must_use]
    pub fn is_viewport_newest(&self) -> bool {
        self.viewport.source == SequenceKind::Listed && self.viewport.last() == self.listed.last()
    }

    /// Apply one update. Returns `true` when anything observable changed.
    pub fn apply(&mut self, update: HistoryUpdate, config: &ViewportConfig) -> bool {
        match update {
            HistoryUpdate::Merge { ids, into, reached_newest, total_count } => {
                let mut changed = false;
                if total_count.is_some() && total_count != self.total_count {
                    self.total_count = total_count;
                    changed = true;
                }
                if into == SequenceKind::Listed && reached_newest && self.is_stale_tail(&ids) {
                    tracing::debug!(
                        cached_len = self.listed.len(),
                        "cached tail is disjoint from the live tail, replacing it"
                    );
                    self.listed = IdSequence::default();
                    self.reached_oldest = false;
                    if self.viewport.source == SequenceKind::Listed {
                        self.viewport = Viewport::default();
                    }
                }
                changed |= self.merge(&ids, into);
                if into == SequenceKind::Outlying {
                    changed |= self.converge(reached_newest);
                }
                changed
            }
            HistoryUpdate::ReplaceViewport { ids, source } => self.replace_viewport(ids, source),
            HistoryUpdate::DropOutlying => {
                let dropped = self.outlying.take().is_some();
                if dropped && self.viewport.source == SequenceKind::Outlying {
                    self.viewport = Viewport::default();
                }
                dropped
            }
            HistoryUpdate::SetLoading(is_loading) => {
                let changed = self.is_loading != is_loading;
                self.is_loading = is_loading;
                changed
            }
            HistoryUpdate::ReachedOldest => {
                let changed = !self.reached_oldest && !self.listed.is_empty();
                self.reached_oldest |= changed;
                changed
            }
            HistoryUpdate::MessageArrived(id) => self.append(id, config),
            HistoryUpdate::MessagesDeleted(ids) => self.delete(&ids),
            HistoryUpdate::LocalConfirmed { local_id, server_id } => {
                self.confirm_local(local_id, server_id)
            }
        }
    }

    /// A live-tail batch that starts after the cached listed run without
    /// touching it means messages were missed while the thread was closed.
    /// Forward pages always include their reference, so they never qualify.
    fn is_stale_tail(&self, ids: &[MessageId]) -> bool {
        matches!((self.listed.last(), ids.iter().min()), (Some(last), Some(&first)) if first > last)
    }

    fn merge(&mut self, ids: &[MessageId], into: SequenceKind) -> bool {
        match into {
            SequenceKind::Listed => self.listed.merge(ids),
            SequenceKind::Outlying => match self.outlying.as_mut() {
                Some(outlying) => outlying.merge(ids),
                None if ids.is_empty() => false,
                None => {
                    self.outlying = Some(ids.iter().copied().collect());
                    true
                }
            },
        }
    }

    /// Fold the outlying run into the listed one once they are known to be
    /// contiguous: they share an id, or the outlying run reached the tail.
    fn converge(&mut self, reached_newest: bool) -> bool {
        let Some(outlying) = self.outlying.as_ref() else {
            return false;
        };
        let contiguous = outlying.is_empty()
            || outlying.intersects(&self.listed)
            || (reached_newest && self.listed.last().is_none_or(|last| outlying.spans(last)));
        if !contiguous {
            return false;
        }

        if let Some(outlying) = self.outlying.take() {
            tracing::debug!(
                outlying_len = outlying.len(),
                listed_len = self.listed.len(),
                "outlying history converged with listed history"
            );
            self.listed.merge(outlying.as_slice());
        }
        if self.viewport.source == SequenceKind::Outlying {
            self.viewport.source = SequenceKind::Listed;
        }
        true
    }

    fn replace_viewport(&mut self, mut ids: Vec<MessageId>, source: SequenceKind) -> bool {
        ids.sort_unstable();
        ids.dedup();
        if self.viewport.source == source && *self.viewport.ids == *ids {
            return false;
        }
        self.viewport = Viewport { ids: Arc::from(ids), source };
        true
    }

    fn append(&mut self, id: MessageId, config: &ViewportConfig) -> bool {
        let was_newest = self.is_viewport_newest();
        let listed_changed = self.listed.merge(&[id]);
        if !was_newest || self.viewport.ids.contains(&id) {
            return listed_changed;
        }

        let keep = if self.viewport.ids.len() < config.viewport_limit() {
            &self.viewport.ids[..]
        } else {
            let start = self.viewport.ids.len().saturating_sub(config.window_size);
            &self.viewport.ids[start..]
        };
        let mut ids = keep.to_vec();
        ids.push(id);
        self.replace_viewport(ids, SequenceKind::Listed) || listed_changed
    }

    fn delete(&mut self, removed: &[MessageId]) -> bool {
        let mut changed = self.listed.remove_all(removed);
        if self.listed.is_empty() {
            self.reached_oldest = false;
        }
        if let Some(outlying) = self.outlying.as_mut() {
            changed |= outlying.remove_all(removed);
            if outlying.is_empty() {
                self.outlying = None;
                if self.viewport.source == SequenceKind::Outlying {
                    self.viewport.source = SequenceKind::Listed;
                }
            }
        }
        if self.viewport.ids.iter().any(|id| removed.contains(id)) {
            let ids: Vec<MessageId> =
                self.viewport.ids.iter().copied().filter(|id| !removed.contains(id)).collect();
            self.viewport.ids = Arc::from(ids);
            changed = true;
        }
        changed
    }

    fn confirm_local(&mut self, local_id: MessageId, server_id: MessageId) -> bool {
        let mut changed = self.listed.replace(local_id, server_id);
        if let Some(outlying) = self.outlying.as_mut() {
            changed |= outlying.replace(local_id, server_id);
        }
        if self.viewport.ids.contains(&local_id) {
            let ids: Vec<MessageId> = self
                .viewport
                .ids
                .iter()
                .map(|id| if *id == local_id { server_id } else { *id })
                .collect();
            let source = self.viewport.source;
            changed |= self.replace_viewport(ids, source);
        }
        changed
    }
}
