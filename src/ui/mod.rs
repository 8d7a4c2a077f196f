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

mod chat;
mod header;
pub mod layout;
pub mod theme;

use crate::app::App;
use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use std::sync::Arc;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub fn render(frame: &mut Frame, app: &mut App) {
    let areas = layout::compute(frame.area());

    // The list host must match the body before anything is painted.
    app.resize(areas.body.width, areas.body.height);

    if areas.header.height > 0 {
        header::render(frame, areas.header, app);
        render_separator(frame, areas.header_sep);
    }

    chat::render(frame, areas.body, app);

    if let Some(footer_area) = areas.footer {
        render_separator(frame, areas.footer_sep);
        render_footer(frame, footer_area, app);
    }
}

const FOOTER_PAD: u16 = 2;
const FOOTER_KEYS: &str = "\u{2191}\u{2193} PgUp/PgDn scroll  n receive  s send  d delete  j jump  G newest  q quit";

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let padded = Rect {
        x: area.x + FOOTER_PAD,
        y: area.y,
        width: area.width.saturating_sub(FOOTER_PAD * 2),
        height: area.height,
    };

    let (right_text, right_color) = footer_status(app);
    let right_width = u16::try_from(UnicodeWidthStr::width(right_text.as_str()))
        .unwrap_or(u16::MAX)
        .min(padded.width / 2);
    let left = Rect { width: padded.width.saturating_sub(right_width + 1), ..padded };
    let right = Rect { x: padded.x + padded.width.saturating_sub(right_width), width: right_width, ..padded };

    if let Some(keys) = fit_footer_text(FOOTER_KEYS, usize::from(left.width)) {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(keys, Style::default().fg(theme::DIM)))),
            left,
        );
    }
    render_footer_right_info(frame, right, &right_text, right_color);
}

fn footer_status(app: &App) -> (String, Color) {
    if let Some(notice) = &app.notice {
        return (notice.clone(), theme::STATUS_ERROR);
    }
    if app.history.is_loading {
        return ("loading\u{2026}".to_owned(), theme::STATUS_LOADING);
    }
    let hints = app.controller.render_hints(Arc::clone(&app.history.viewport.ids));
    if hints.is_at_bottom {
        return ("at newest".to_owned(), theme::DIM);
    }
    let offset = app.controller.scroll_offset();
    (format!("{} shown, offset {offset:.0}", hints.viewport_ids.len()), theme::DIM)
}

fn fit_footer_text(text: &str, max_width: usize) -> Option<String> {
    if max_width == 0 || text.trim().is_empty() {
        return None;
    }

    if UnicodeWidthStr::width(text) <= max_width {
        return Some(text.to_owned());
    }

    if max_width <= 3 {
        return Some(".".repeat(max_width));
    }

    let mut fitted = String::new();
    let mut width: usize = 0;
    for ch in text.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width.saturating_add(ch_width).saturating_add(3) > max_width {
            break;
        }
        fitted.push(ch);
        width = width.saturating_add(ch_width);
    }

    if fitted.is_empty() {
        return Some("...".to_owned());
    }
    fitted.push_str("...");
    Some(fitted)
}

fn render_footer_right_info(frame: &mut Frame, area: Rect, right_text: &str, right_color: Color) {
    if area.width == 0 {
        return;
    }
    let Some(fitted) = fit_footer_text(right_text, usize::from(area.width)) else {
        return;
    };

    let line = Line::from(Span::styled(fitted, Style::default().fg(right_color)));
    frame.render_widget(Paragraph::new(line).alignment(Alignment::Right), area);
}

fn render_separator(frame: &mut Frame, area: Rect) {
    if area.height == 0 {
        return;
    }
    let sep_str = theme::SEPARATOR_CHAR.repeat(area.width as usize);
    let line = Line::from(Span::styled(sep_str, Style::default().fg(theme::DIM)));
    frame.render_widget(Paragraph::new(line), area);
}
