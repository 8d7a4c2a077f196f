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

//! Row-based layout of the viewport for the terminal, acting as the scroll
//! container the anchor controller measures and mutates.
//!
//! Content is bottom-aligned: when it is shorter than the container, padding
//! rows are added on top so the newest message sits on the last row.

use crate::anchor::{LayoutMeasure, LayoutMutate};
use crate::history::{HistoryMessage, MessageId};
use std::collections::HashMap;
use std::sync::Arc;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Columns reserved on the left of message text.
pub const TEXT_INDENT: u16 = 2;
/// Blank rows after each message.
const ITEM_GAP: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub id: MessageId,
    /// First row of the item in content coordinates.
    pub offset: usize,
    pub author: String,
    pub is_local: bool,
    /// Wrapped text, empty while the body is not loaded.
    pub lines: Vec<String>,
}

impl ListItem {
    #[must_use]
    pub fn height(&self) -> usize {
        1 + self.lines.len() + ITEM_GAP
    }
}

/// One terminal row of the list, as the renderer sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row<'a> {
    Padding,
    Divider,
    Header(&'a ListItem),
    Text(&'a ListItem, &'a str),
    Gap,
}

#[derive(Debug, Default)]
pub struct ListLayout {
    width: u16,
    height: u16,
    items: Vec<ListItem>,
    index: HashMap<MessageId, usize>,
    /// Content row of the unread divider, when its message is laid out.
    divider_row: Option<usize>,
    padding: usize,
    content_height: usize,
    scroll_top: f64,
}

impl ListLayout {
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height, ..Self::default() }
    }

    #[must_use]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Returns `true` when the size actually changed; the caller must relayout.
    pub fn set_size(&mut self, width: u16, height: u16) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        self.width = width;
        self.height = height;
        true
    }

    /// Lay out `ids` from scratch. The scroll top is kept as is; correcting it
    /// is the anchor controller's job.
    pub fn relayout(
        &mut self,
        ids: &[MessageId],
        divider_id: Option<MessageId>,
        local_floor: MessageId,
        body: impl Fn(MessageId) -> Option<Arc<HistoryMessage>>,
    ) {
        let text_width = usize::from(self.width.saturating_sub(TEXT_INDENT)).max(1);
        self.items.clear();
        self.index.clear();
        self.divider_row = None;

        let mut row = 0;
        for &id in ids {
            if divider_id == Some(id) {
                self.divider_row = Some(row);
                row += 1;
            }
            let message = body(id);
            let item = ListItem {
                id,
                offset: row,
                author: message.as_ref().map_or_else(String::new, |m| m.author.clone()),
                is_local: id >= local_floor,
                lines: message.map_or_else(Vec::new, |m| wrap_text(&m.text, text_width)),
            };
            row += item.height();
            self.index.insert(id, self.items.len());
            self.items.push(item);
        }

        let content = row;
        self.padding = usize::from(self.height).saturating_sub(content);
        self.content_height = content + self.padding;
        for item in &mut self.items {
            item.offset += self.padding;
        }
        if let Some(divider) = self.divider_row.as_mut() {
            *divider += self.padding;
        }
        self.scroll_top = self.scroll_top.clamp(0.0, self.max_scroll_top());
    }

    #[must_use]
    pub fn items(&self) -> &[ListItem] {
        &self.items
    }

    #[must_use]
    pub fn max_scroll_top(&self) -> f64 {
        self.content_height.saturating_sub(usize::from(self.height)) as f64
    }

    /// Move by `rows` (negative scrolls towards older messages).
    pub fn scroll_by(&mut self, rows: f64) {
        self.set_scroll_top(self.scroll_top + rows);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.set_scroll_top(self.max_scroll_top());
    }

    /// Put `id` in the middle of the container. Returns `false` when it is
    /// not laid out.
    pub fn center_on(&mut self, id: MessageId) -> bool {
        let Some(item) = self.item(id) else {
            return false;
        };
        let middle = item.offset as f64 + item.height() as f64 / 2.0;
        self.set_scroll_top(middle - f64::from(self.height) / 2.0);
        true
    }

    #[must_use]
    pub fn rows_below(&self) -> f64 {
        (self.content_height as f64 - self.scroll_top - f64::from(self.height)).max(0.0)
    }

    /// Topmost message with at least one visible row.
    #[must_use]
    pub fn first_visible_id(&self) -> Option<MessageId> {
        let top = self.scroll_top;
        self.items
            .iter()
            .find(|item| (item.offset + item.height()) as f64 > top)
            .map(|item| item.id)
    }

    /// Rows currently inside the container, top to bottom.
    #[must_use]
    pub fn visible_rows(&self) -> Vec<Row<'_>> {
        let first = self.scroll_top.floor().max(0.0) as usize;
        (first..first + usize::from(self.height))
            .take_while(|row| *row < self.content_height)
            .map(|row| self.row(row))
            .collect()
    }

    fn row(&self, row: usize) -> Row<'_> {
        if row < self.padding {
            return Row::Padding;
        }
        if self.divider_row == Some(row) {
            return Row::Divider;
        }
        let position = self.items.partition_point(|item| item.offset <= row);
        let Some(item) = position.checked_sub(1).and_then(|index| self.items.get(index)) else {
            return Row::Padding;
        };
        match row - item.offset {
            0 => Row::Header(item),
            line if line <= item.lines.len() => Row::Text(item, &item.lines[line - 1]),
            _ => Row::Gap,
        }
    }

    fn item(&self, id: MessageId) -> Option<&ListItem> {
        self.index.get(&id).and_then(|index| self.items.get(*index))
    }
}

impl LayoutMeasure for ListLayout {
    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn scroll_height(&self) -> f64 {
        self.content_height as f64
    }

    fn container_height(&self) -> f64 {
        f64::from(self.height)
    }

    fn rendered_ids(&self) -> Vec<MessageId> {
        self.items.iter().map(|item| item.id).collect()
    }

    fn item_top(&self, id: MessageId) -> Option<f64> {
        self.item(id).map(|item| item.offset as f64 - self.scroll_top)
    }

    fn item_height(&self, id: MessageId) -> Option<f64> {
        self.item(id).map(|item| item.height() as f64)
    }

    fn divider_offset(&self) -> Option<f64> {
        self.divider_row.map(|row| row as f64)
    }
}

impl LayoutMutate for ListLayout {
    fn set_scroll_top(&mut self, scroll_top: f64) {
        let scroll_top = if scroll_top.is_finite() { scroll_top } else { 0.0 };
        self.scroll_top = scroll_top.clamp(0.0, self.max_scroll_top()).round();
    }
}

/// Greedy word wrap by display width. Words wider than `width` are split.
#[must_use]
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut line_width = 0;
        for word in paragraph.split_whitespace() {
            let word_width = UnicodeWidthStr::width(word);
            if line_width > 0 && line_width + 1 + word_width > width {
                lines.push(std::mem::take(&mut line));
                line_width = 0;
            }
            if word_width > width {
                for ch in word.chars() {
                    let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
                    if line_width > 0 && line_width + ch_width > width {
                        lines.push(std::mem::take(&mut line));
                        line_width = 0;
                    }
                    line.push(ch);
                    line_width += ch_width;
                }
                continue;
            }
            if line_width > 0 {
                line.push(' ');
                line_width += 1;
            }
            line.push_str(word);
            line_width += word_width;
        }
        lines.push(line);
    }
    lines
}
