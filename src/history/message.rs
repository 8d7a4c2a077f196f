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

use super::ids::MessageId;
use serde::{Deserialize, Serialize};

/// Message body as delivered by the remote. The viewport machinery only looks
/// at `id`; the rest is carried for the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub id: MessageId,
    pub author: String,
    pub text: String,
    /// Unix seconds.
    pub date: u64,
}

impl HistoryMessage {
    pub fn new(id: MessageId, author: impl Into<String>, text: impl Into<String>, date: u64) -> Self {
        Self { id, author: author.into(), text: text.into(), date }
    }
}
