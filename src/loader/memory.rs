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

//! In-process stand-in for the remote history, used by tests and the demo.

use super::source::{FetchRequest, FetchResult, HistorySource};
use crate::history::{HistoryMessage, MessageId, ThreadKey};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

const AUTHORS: &[&str] = &["ana", "bo", "cyd", "dee"];
const LINES: &[&str] = &[
    "ok",
    "sounds good to me",
    "did anyone look at the build logs from last night? the cache step keeps timing out",
    "lunch?",
    "pushed a fix, please review when you get a chance",
    "I think the scroll position jumps whenever older history comes in, can you reproduce it on your side as well?",
    "thanks!",
];

#[derive(Debug, Default)]
struct Remote {
    threads: HashMap<ThreadKey, Vec<HistoryMessage>>,
    requests: Vec<FetchRequest>,
}

/// Remote history kept in memory, ascending by id.
#[derive(Debug, Default)]
pub struct MemoryHistorySource {
    remote: Mutex<Remote>,
    latency: Duration,
    /// Fail every n-th fetch (1-based); `0` never fails.
    fail_every: usize,
    fetches: AtomicUsize,
}

impl MemoryHistorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    #[must_use]
    pub fn with_fail_every(mut self, fail_every: usize) -> Self {
        self.fail_every = fail_every;
        self
    }

    /// Seed `thread` with messages `1..=count` of generated chatter.
    #[must_use]
    pub fn with_generated(self, thread: &ThreadKey, count: usize) -> Self {
        let messages = (1..=count as MessageId).map(generated_message).collect();
        self.lock().threads.insert(thread.clone(), messages);
        self
    }

    /// Seed `thread` with specific ids (e.g. sparse ids after deletions).
    #[must_use]
    pub fn with_ids(self, thread: &ThreadKey, ids: impl IntoIterator<Item = MessageId>) -> Self {
        let mut messages: Vec<HistoryMessage> = ids.into_iter().map(generated_message).collect();
        messages.sort_by_key(|message| message.id);
        messages.dedup_by_key(|message| message.id);
        self.lock().threads.insert(thread.clone(), messages);
        self
    }

    /// Deliver a new message server-side and return it.
    pub fn post(&self, thread: &ThreadKey, author: &str, text: &str) -> HistoryMessage {
        let mut remote = self.lock();
        let messages = remote.threads.entry(thread.clone()).or_default();
        let id = messages.last().map_or(1, |last| last.id + 1);
        let message = HistoryMessage::new(id, author, text, date_for(id));
        messages.push(message.clone());
        message
    }

    pub fn delete(&self, thread: &ThreadKey, ids: &[MessageId]) {
        if let Some(messages) = self.lock().threads.get_mut(thread) {
            messages.retain(|message| !ids.contains(&message.id));
        }
    }

    /// Oldest message newer than `last_read`, i.e. where unread history starts.
    pub fn first_after(&self, thread: &ThreadKey, last_read: MessageId) -> Option<MessageId> {
        let remote = self.lock();
        let messages = remote.threads.get(thread)?;
        let index = messages.partition_point(|message| message.id <= last_read);
        messages.get(index).map(|message| message.id)
    }

    /// Number of fetches served or failed so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Every request seen so far, oldest first.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Remote> {
        self.remote.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn page(&self, request: &FetchRequest) -> Option<FetchResult> {
        let remote = self.lock();
        let messages = remote.threads.get(&request.thread)?;
        let len = messages.len();
        let boundary = request
            .reference_id
            .map_or(len, |reference| messages.partition_point(|message| message.id < reference));
        let shift = request.add_offset.map_or(0, |offset| offset.unsigned_abs() as usize);
        let end = if request.add_offset.is_some_and(|offset| offset > 0) {
            boundary.saturating_sub(shift)
        } else {
            boundary.saturating_add(shift).min(len)
        };
        let start = end.saturating_sub(request.limit);
        Some(FetchResult {
            messages: messages[start..end].to_vec(),
            total_count: Some(len),
            reached_oldest: start == 0,
            reached_newest: end == len,
        })
    }
}

#[async_trait]
impl HistorySource for MemoryHistorySource {
    async fn fetch_messages(&self, request: FetchRequest) -> anyhow::Result<Option<FetchResult>> {
        let attempt = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        self.lock().requests.push(request.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_every > 0 && attempt % self.fail_every == 0 {
            anyhow::bail!("simulated network failure on fetch #{attempt}");
        }
        Ok(self.page(&request))
    }
}

/// Deterministic body for id `id`.
#[must_use]
pub fn generated_message(id: MessageId) -> HistoryMessage {
    let index = id.unsigned_abs() as usize;
    let author = AUTHORS[index % AUTHORS.len()];
    let line = LINES[(index * 7 + index / 3) % LINES.len()];
    HistoryMessage::new(id, author, format!("#{id} {line}"), date_for(id))
}

fn date_for(id: MessageId) -> u64 {
    1_700_000_000 + id.unsigned_abs() * 90
}
