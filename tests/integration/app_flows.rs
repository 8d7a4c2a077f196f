// =====
// TESTS: 6
// =====
//
// App-level integration tests.
// Runs the app state against the in-memory remote and renders frames into a
// test backend, without a real terminal.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use message_viewport::anchor::LayoutMeasure as _;
use message_viewport::app::{App, handle_terminal_event, terminal_config};
use message_viewport::config::LOCAL_ID_FLOOR;
use message_viewport::history::{HistoryStore, MessageId};
use message_viewport::loader::memory::MemoryHistorySource;
use pretty_assertions::assert_eq;
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use std::sync::Arc;
use std::time::Duration;

use crate::helpers::{config, thread};

const WIDTH: u16 = 60;
const HEIGHT: u16 = 20;
/// Body rows left after header, footer and their separators.
const BODY: u16 = HEIGHT - 4;

fn test_app(jump_target: Option<MessageId>) -> App {
    let source = Arc::new(MemoryHistorySource::new().with_generated(&thread(), 200));
    let store = HistoryStore::new(terminal_config(config(10)));
    let mut app = App::new(thread(), store, source, Duration::ZERO, jump_target);
    app.resize(WIDTH, BODY);
    app
}

async fn opened_app(jump_target: Option<MessageId>) -> App {
    let mut app = test_app(jump_target);
    app.open_thread();
    pump_until(&mut app, |app| !app.history.viewport.is_empty()).await;
    app
}

/// Feed loader and app events into `app` until `done` holds.
async fn pump_until(app: &mut App, mut done: impl FnMut(&App) -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !done(app) {
            tokio::select! {
                Some(event) = app.loader_rx.recv() => app.handle_loader_event(event),
                Some(event) = app.app_rx.recv() => app.handle_app_event(event),
                else => break,
            }
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for the app");
}

fn press(app: &mut App, code: KeyCode) {
    handle_terminal_event(app, Event::Key(KeyEvent::new(code, KeyModifiers::NONE)));
}

fn render_to_string(app: &mut App) -> String {
    let backend = TestBackend::new(WIDTH, HEIGHT);
    let mut terminal = Terminal::new(backend).expect("create test terminal");
    terminal.draw(|f| message_viewport::ui::render(f, app)).expect("draw frame");

    let mut out = String::new();
    let buffer = terminal.backend().buffer();
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            out.push_str(buffer[(x, y)].symbol());
        }
        out.push('\n');
    }
    out
}

#[tokio::test]
async fn open_renders_newest_messages_at_bottom() {
    let mut app = opened_app(None).await;

    let screen = render_to_string(&mut app);

    assert!(screen.contains("#200"), "newest message missing:\n{screen}");
    assert!(!screen.contains("#150"));
    assert_eq!(app.layout.scroll_top(), app.layout.max_scroll_top());
    assert!(app.controller.is_at_bottom());
}

#[tokio::test]
async fn received_message_is_followed() {
    let mut app = opened_app(None).await;

    press(&mut app, KeyCode::Char('n'));
    pump_until(&mut app, |app| app.history.viewport.last() == Some(201)).await;

    let screen = render_to_string(&mut app);
    assert!(screen.contains("a new message just arrived"), "arrival missing:\n{screen}");
    assert_eq!(app.layout.scroll_top(), app.layout.max_scroll_top());
}

#[tokio::test]
async fn sent_message_is_swapped_for_server_id() {
    let mut app = opened_app(None).await;
    let local = LOCAL_ID_FLOOR + 1;

    press(&mut app, KeyCode::Char('s'));
    pump_until(&mut app, |app| app.history.viewport.ids.contains(&local)).await;
    assert!(render_to_string(&mut app).contains("sending"));

    pump_until(&mut app, |app| app.history.viewport.last() == Some(201)).await;
    assert!(!app.history.viewport.ids.contains(&local));
    let screen = render_to_string(&mut app);
    assert!(screen.contains("local message 1"), "acknowledged message missing:\n{screen}");
    assert!(!screen.contains("sending"));
}

#[tokio::test]
async fn scrolling_records_live_offset() {
    let mut app = opened_app(None).await;
    let bottom = app.layout.scroll_top();

    press(&mut app, KeyCode::Up);

    assert_eq!(app.layout.scroll_top(), bottom - 1.0);
    assert_eq!(app.offsets.live_offset(&thread()), Some(f64::from(BODY) + 1.0));
    assert_eq!(app.offsets.read_offset(&thread()), None);

    app.close_thread();
    assert_eq!(app.offsets.read_offset(&thread()), Some(f64::from(BODY) + 1.0));
}

#[tokio::test]
async fn jump_centers_target() {
    let mut app = opened_app(Some(50)).await;

    press(&mut app, KeyCode::Char('j'));
    pump_until(&mut app, |app| {
        app.history.viewport.ids.contains(&50) && app.pending_focus.is_none()
    })
    .await;

    let top = app.layout.item_top(50).expect("jump target laid out");
    assert!((0.0..f64::from(BODY)).contains(&top), "target at row {top}");
    assert!(!app.history.is_viewport_newest());
}

#[tokio::test]
async fn quit_keys_stop_the_app() {
    let mut app = test_app(None);
    assert!(!app.should_quit);

    press(&mut app, KeyCode::Char('q'));

    assert!(app.should_quit);
}
