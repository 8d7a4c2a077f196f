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

mod events;
pub mod layout;
mod state;

pub use events::handle_terminal_event;
pub use layout::{ListItem, ListLayout, Row, wrap_text};
pub use state::{App, AppEvent, EDGE_PREFETCH_ROWS, PendingFocus, terminal_config};

use crate::error::AppError;
use crossterm::event::EventStream;
use futures::{FutureExt as _, StreamExt};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// TUI event loop
// ---------------------------------------------------------------------------

pub async fn run_tui(app: &mut App) -> anyhow::Result<()> {
    let mut terminal = ratatui::try_init()
        .map_err(|err| anyhow::Error::new(AppError::TerminalSetup).context(err.to_string()))?;

    // Mouse wheel scrolling (ignore error on unsupported terminals)
    let _ = crossterm::execute!(std::io::stdout(), crossterm::event::EnableMouseCapture);

    let mut events = EventStream::new();
    let tick_duration = Duration::from_millis(16);
    let mut last_render = Instant::now();

    let result = loop {
        // Phase 1: wait for at least one event or the next frame tick
        let time_to_next = tick_duration.saturating_sub(last_render.elapsed());
        tokio::select! {
            Some(Ok(event)) = events.next() => {
                events::handle_terminal_event(app, event);
            }
            Some(event) = app.loader_rx.recv() => {
                app.handle_loader_event(event);
            }
            Some(event) = app.app_rx.recv() => {
                app.handle_app_event(event);
            }
            () = tokio::time::sleep(time_to_next) => {}
        }

        // Phase 2: drain all remaining queued events (non-blocking)
        loop {
            // Terminal events first (keeps scrolling responsive)
            if let Some(Some(Ok(event))) = events.next().now_or_never() {
                events::handle_terminal_event(app, event);
                continue;
            }
            if let Ok(event) = app.loader_rx.try_recv() {
                app.handle_loader_event(event);
                continue;
            }
            match app.app_rx.try_recv() {
                Ok(event) => app.handle_app_event(event),
                Err(_) => break,
            }
        }

        if app.should_quit {
            break Ok(());
        }

        app.offsets.commit_due(Instant::now());

        // Phase 3: render once
        if let Err(err) = terminal.draw(|f| crate::ui::render(f, app)) {
            break Err(anyhow::Error::new(err).context("failed to draw frame"));
        }
        last_render = Instant::now();
    };

    // Restore terminal
    let _ = crossterm::execute!(std::io::stdout(), crossterm::event::DisableMouseCapture);
    ratatui::restore();

    result
}
