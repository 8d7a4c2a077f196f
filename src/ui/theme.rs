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

use ratatui::style::Color;

// Accent
pub const RUST_ORANGE: Color = Color::Rgb(244, 118, 0);

// UI chrome
pub const DIM: Color = Color::DarkGray;
pub const SEPARATOR_CHAR: &str = "─";

// Author header colors
pub const AUTHOR_SELF: Color = Color::White;
pub const AUTHOR_OTHER: Color = RUST_ORANGE;
pub const LOCAL_PENDING: Color = Color::Yellow;

// Unread divider
pub const DIVIDER: Color = Color::Cyan;
pub const DIVIDER_LABEL: &str = " unread messages ";

// Status colors
pub const STATUS_LOADING: Color = Color::Cyan;
pub const STATUS_ERROR: Color = Color::Red;
pub const STATUS_OUTLYING: Color = Color::Magenta;

/// Header color for a message author.
pub fn author_color(author: &str) -> Color {
    if author == "me" { AUTHOR_SELF } else { AUTHOR_OTHER }
}
