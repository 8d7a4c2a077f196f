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

use crate::config::ViewportConfig;
use crate::history::{Direction, HistoryMessage, MessageId, ThreadKey};
use async_trait::async_trait;

/// One page request against the remote history.
///
/// Paging follows the usual offset-id convention: the remote locates the
/// boundary just before `reference_id` (the newest end when absent), moves it
/// `-add_offset` messages towards newer history, and returns up to `limit`
/// messages older than that boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub thread: ThreadKey,
    pub reference_id: Option<MessageId>,
    pub add_offset: Option<i64>,
    pub limit: usize,
}

/// Page returned by the remote, oldest first after normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResult {
    pub messages: Vec<HistoryMessage>,
    /// Total number of messages in the thread, if the remote reports it.
    pub total_count: Option<usize>,
    /// Nothing older than this page exists.
    pub reached_oldest: bool,
    /// Nothing newer than this page exists.
    pub reached_newest: bool,
}

/// Remote paginated history, e.g. a network client.
///
/// `Ok(None)` means "no data" and is treated like a failure without being
/// logged as one.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_messages(&self, request: FetchRequest) -> anyhow::Result<Option<FetchResult>>;
}

/// Build the page request for a slice that was not satisfied locally.
#[must_use]
pub fn fetch_request(
    thread: &ThreadKey,
    reference: Option<MessageId>,
    direction: Direction,
    config: &ViewportConfig,
) -> FetchRequest {
    let window = config.window_size.max(1) as i64;
    let limit = config.fetch_limit().max(1);
    let (add_offset, limit) = match (reference, direction) {
        (None, _) => (None, limit),
        (Some(_), Direction::Around) => (Some(-(window + 1)), limit),
        (Some(_), Direction::Backwards) => (None, limit),
        (Some(_), Direction::Forwards) => (Some(-(2 * window + 1)), limit + 1),
    };
    FetchRequest { thread: thread.clone(), reference_id: reference, add_offset, limit }
}
