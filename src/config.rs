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

use crate::history::MessageId;
use std::time::Duration;

pub const DEFAULT_WINDOW_SIZE: usize = 30;
pub const DEFAULT_BOTTOM_THRESHOLD: f64 = 50.0;
pub const DEFAULT_BOTTOM_FOCUS_MARGIN: f64 = 20.0;
pub const DEFAULT_DIVIDER_TOP: f64 = 10.0;
pub const DEFAULT_DIVIDER_TOP_WITH_TOOLS: f64 = 60.0;
pub const DEFAULT_SCROLL_DEBOUNCE: Duration = Duration::from_millis(200);

/// Ids at or above this value belong to optimistically created messages that
/// the server has not acknowledged yet.
pub const LOCAL_ID_FLOOR: MessageId = 5_000_000_000;

/// Policy knobs shared by the resolver, loader and anchor controller.
///
/// Only the relative roles matter: the Around window is symmetric around its
/// reference, and `bottom_threshold` stays small compared to one item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportConfig {
    /// Half window `W`. Around windows hold at most `2W - 1` ids, directional
    /// windows `2W`, and fetch batches request `2W` ids.
    pub window_size: usize,
    /// Distance from the bottom still treated as "pinned" for bottom-follow.
    pub bottom_threshold: f64,
    /// Gap left under the tail item when following new messages.
    pub bottom_focus_margin: f64,
    /// Distance kept between the container top and the unread divider.
    pub divider_top: f64,
    /// Same as `divider_top`, used while extra chrome covers the top edge.
    pub divider_top_with_tools: f64,
    /// Scroll quiet period before an offset is committed to the store.
    pub scroll_debounce: Duration,
    pub local_id_floor: MessageId,
}

impl ViewportConfig {
    /// Ids requested from the remote for one slice.
    #[must_use]
    pub const fn fetch_limit(&self) -> usize {
        self.window_size * 2
    }

    /// Longest viewport kept when new messages are appended at the tail.
    #[must_use]
    pub const fn viewport_limit(&self) -> usize {
        self.window_size * 4
    }

    #[must_use]
    pub const fn is_local(&self, id: MessageId) -> bool {
        id >= self.local_id_floor
    }

    #[must_use]
    pub const fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            bottom_threshold: DEFAULT_BOTTOM_THRESHOLD,
            bottom_focus_margin: DEFAULT_BOTTOM_FOCUS_MARGIN,
            divider_top: DEFAULT_DIVIDER_TOP,
            divider_top_with_tools: DEFAULT_DIVIDER_TOP_WITH_TOOLS,
            scroll_debounce: DEFAULT_SCROLL_DEBOUNCE,
            local_id_floor: LOCAL_ID_FLOOR,
        }
    }
}
