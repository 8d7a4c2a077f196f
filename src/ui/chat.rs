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

use crate::app::{App, ListItem, Row, layout::TEXT_INDENT};
use crate::ui::theme;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::Paragraph;
use unicode_width::UnicodeWidthStr;

/// Draw the rows of the laid-out viewport that fall inside `area`.
///
/// The layout was already sized to `area` and scroll-corrected; this only
/// paints.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    if app.history.viewport.is_empty() {
        render_placeholder(frame, area, app);
        return;
    }

    let lines: Vec<Line<'_>> =
        app.layout.visible_rows().into_iter().map(|row| row_line(row, area.width)).collect();
    frame.render_widget(Paragraph::new(Text::from(lines)), area);
}

fn row_line(row: Row<'_>, width: u16) -> Line<'_> {
    match row {
        Row::Padding | Row::Gap => Line::default(),
        Row::Divider => divider_line(width),
        Row::Header(item) => header_line(item),
        Row::Text(_, text) => Line::from(vec![
            Span::raw(" ".repeat(usize::from(TEXT_INDENT))),
            Span::raw(text),
        ]),
    }
}

fn header_line(item: &ListItem) -> Line<'_> {
    let author = if item.author.is_empty() { "\u{2026}" } else { item.author.as_str() };
    let mut spans = vec![
        Span::styled(
            author,
            Style::default().fg(theme::author_color(author)).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("  #{}", item.id), Style::default().fg(theme::DIM)),
    ];
    if item.is_local {
        spans.push(Span::styled("  sending\u{2026}", Style::default().fg(theme::LOCAL_PENDING)));
    }
    Line::from(spans)
}

fn divider_line(width: u16) -> Line<'static> {
    let label_width = UnicodeWidthStr::width(theme::DIVIDER_LABEL);
    let side = usize::from(width).saturating_sub(label_width) / 2;
    let rule = theme::SEPARATOR_CHAR.repeat(side);
    Line::from(vec![
        Span::styled(rule.clone(), Style::default().fg(theme::DIVIDER)),
        Span::styled(theme::DIVIDER_LABEL, Style::default().fg(theme::DIVIDER)),
        Span::styled(rule, Style::default().fg(theme::DIVIDER)),
    ])
}

fn render_placeholder(frame: &mut Frame, area: Rect, app: &App) {
    let text = if app.history.is_loading { "Loading history\u{2026}" } else { "No messages" };
    let color = if app.history.is_loading { theme::STATUS_LOADING } else { theme::DIM };
    let y = area.y + area.height / 2;
    let line_area = Rect { y, height: 1.min(area.height), ..area };
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(text, Style::default().fg(color))))
            .alignment(ratatui::layout::Alignment::Center),
        line_area,
    );
}
