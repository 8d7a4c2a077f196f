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

use crate::app::App;
use crate::history::SequenceKind;
use crate::ui::theme;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

const HEADER_PAD: u16 = 2;

pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let padded = Rect {
        x: area.x + HEADER_PAD,
        y: area.y,
        width: area.width.saturating_sub(HEADER_PAD * 2),
        height: area.height,
    };

    let sep = || Span::styled("  \u{2502}  ", Style::default().fg(theme::DIM));
    let history = &app.history;

    let mut spans = vec![
        Span::styled(
            "msgview",
            Style::default().fg(theme::RUST_ORANGE).add_modifier(Modifier::BOLD),
        ),
        sep(),
        Span::styled("Thread: ", Style::default().fg(theme::DIM)),
        Span::styled(app.thread.to_string(), Style::default().fg(ratatui::style::Color::White)),
        sep(),
        Span::styled("Loaded: ", Style::default().fg(theme::DIM)),
        Span::raw(match history.total_count {
            Some(total) => format!("{}/{total}", history.listed.len()),
            None => history.listed.len().to_string(),
        }),
    ];
    if history.viewport.source == SequenceKind::Outlying {
        spans.push(sep());
        spans.push(Span::styled("jumped (G for newest)", Style::default().fg(theme::STATUS_OUTLYING)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), padded);
}
