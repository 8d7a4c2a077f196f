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

//! Known message history: id sequences, viewport windowing, and the shared
//! store that owns both.

mod ids;
mod message;
mod slice;
mod store;
mod thread;

pub use ids::{IdSequence, MessageId, are_sorted_intersecting, merge_sorted};
pub use message::HistoryMessage;
pub use slice::{Direction, Slice, find_nearest_index, resolve_slice};
pub use store::HistoryStore;
pub use thread::{
    HistoryUpdate, MAIN_THREAD_ID, SequenceKind, ThreadHistory, ThreadKey, Viewport,
};
