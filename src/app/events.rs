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

use super::App;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind};

const MOUSE_SCROLL_LINES: f64 = 3.0;
const KEY_SCROLL_LINES: f64 = 1.0;

pub fn handle_terminal_event(app: &mut App, event: Event) {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(app, key),
        Event::Mouse(mouse) => handle_mouse_event(app, mouse),
        // Resize is picked up from the frame size before the next draw
        _ => {}
    }
}

fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_by(-MOUSE_SCROLL_LINES),
        MouseEventKind::ScrollDown => app.scroll_by(MOUSE_SCROLL_LINES),
        _ => {}
    }
}

fn page_rows(app: &App) -> f64 {
    f64::from(app.layout.height().saturating_sub(2).max(1))
}

fn handle_key(app: &mut App, key: KeyEvent) {
    match (key.code, key.modifiers) {
        (KeyCode::Char('c'), m) if m.contains(KeyModifiers::CONTROL) => app.should_quit = true,
        (KeyCode::Char('q') | KeyCode::Esc, _) => app.should_quit = true,
        (KeyCode::Up, _) => app.scroll_by(-KEY_SCROLL_LINES),
        (KeyCode::Down, _) => app.scroll_by(KEY_SCROLL_LINES),
        (KeyCode::PageUp, _) => app.scroll_by(-page_rows(app)),
        (KeyCode::PageDown, _) => app.scroll_by(page_rows(app)),
        (KeyCode::Char('n'), _) => app.receive_message(),
        (KeyCode::Char('s'), _) => app.send_message(),
        (KeyCode::Char('d'), _) => app.delete_top_message(),
        (KeyCode::Char('j'), _) => app.jump(),
        (KeyCode::Char('G'), _) => app.go_to_newest(),
        _ => {}
    }
}
