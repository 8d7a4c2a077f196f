// =====
// TESTS: 6
// =====
//
// Scroll anchoring integration tests.
// Loads history through the loader, lays it out in the terminal list and
// checks that what the reader looks at stays where it was.

use message_viewport::anchor::{CorrectionKind, LayoutMeasure as _, LayoutMutate as _};
use message_viewport::app::terminal_config;
use message_viewport::history::Direction;
use message_viewport::loader::memory::MemoryHistorySource;
use pretty_assertions::assert_eq;

use crate::helpers::{Harness, Screen, config, range, thread};

const WIDTH: u16 = 60;
const HEIGHT: u16 = 20;

fn setup(window_size: usize, count: usize) -> (Harness, Screen) {
    let config = terminal_config(config(window_size));
    let source = MemoryHistorySource::new().with_generated(&thread(), count);
    (Harness::new(config, source), Screen::new(config, WIDTH, HEIGHT))
}

#[tokio::test]
async fn first_frame_lands_at_the_bottom() {
    let (h, mut screen) = setup(10, 200);
    h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;

    let correction = screen.sync(&h.store);

    assert_eq!(correction.scroll_top, screen.layout.max_scroll_top());
    assert_eq!(correction.scroll_offset, f64::from(HEIGHT));
    assert!(screen.controller.is_at_bottom());
}

#[tokio::test]
async fn arrival_at_bottom_follows_the_tail() {
    let (h, mut screen) = setup(10, 200);
    h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;
    screen.sync(&h.store);

    let message = h.source.post(&thread(), "bo", "fresh");
    h.loader.message_arrived(&thread(), message);
    let correction = screen.sync(&h.store);

    assert_eq!(correction.kind, CorrectionKind::Follow);
    assert_eq!(correction.scroll_offset, f64::from(HEIGHT));
    let top = screen.layout.item_top(201).expect("new message laid out");
    let height = screen.layout.item_height(201).expect("new message laid out");
    assert_eq!(top + height, f64::from(HEIGHT));
}

#[tokio::test]
async fn arrival_while_reading_history_does_not_move_content() {
    let (h, mut screen) = setup(10, 200);
    h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;
    screen.sync(&h.store);
    screen.layout.set_scroll_top(0.0);
    screen.controller.on_scroll(&screen.layout);
    let before = screen.layout.item_top(192);

    let message = h.source.post(&thread(), "bo", "fresh");
    h.loader.message_arrived(&thread(), message);
    let correction = screen.sync(&h.store);

    assert_eq!(correction.kind, CorrectionKind::Anchor);
    assert_eq!(screen.layout.item_top(192), before);
}

#[tokio::test]
async fn jump_then_older_page_keeps_top_message_in_place() {
    let (h, mut screen) = setup(50, 200);
    h.loader.ensure_viewport(&thread(), Some(150), Direction::Around, false).await;
    screen.sync(&h.store);

    let ids = h.viewport_ids();
    assert_eq!(ids, range(101, 199));
    let position = ids.iter().position(|id| *id == 150).expect("jump target in viewport");
    assert!(position >= ids.len() / 3 && position < ids.len() * 2 / 3);

    screen.layout.set_scroll_top(0.0);
    screen.controller.on_scroll(&screen.layout);
    assert_eq!(screen.layout.item_top(101), Some(0.0));

    h.loader.ensure_viewport(&thread(), Some(101), Direction::Backwards, false).await;
    let correction = screen.sync(&h.store);

    assert_eq!(h.viewport_ids(), range(51, 150));
    assert_eq!(correction.kind, CorrectionKind::Anchor);
    assert_eq!(screen.layout.item_top(101), Some(0.0));
}

#[tokio::test]
async fn deleted_anchor_falls_back_to_offset() {
    let (h, mut screen) = setup(10, 200);
    h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;
    screen.sync(&h.store);
    screen.layout.set_scroll_top(4.0);
    screen.controller.on_scroll(&screen.layout);

    let history = h.history();
    screen.controller.capture(&screen.layout, &history.viewport.ids);
    let anchor = screen.controller.anchor().expect("anchor captured");
    h.loader.messages_deleted(&thread(), &[anchor.id]);
    let correction = screen.lay_out(&h.store, &h.history());

    assert_eq!(correction.kind, CorrectionKind::Offset);
    assert!(correction.scroll_top.is_finite());
    assert!(correction.scroll_top >= 0.0 && correction.scroll_top <= screen.layout.max_scroll_top());
    assert_eq!(screen.layout.item_top(anchor.id), None);
}

#[tokio::test]
async fn unread_divider_is_placed_below_the_top_edge() {
    let (h, mut screen) = setup(10, 200);
    screen.controller.open(None, Some(195));
    h.loader.ensure_viewport(&thread(), None, Direction::Around, false).await;

    let correction = screen.sync(&h.store);

    assert_eq!(correction.kind, CorrectionKind::Divider);
    let divider = screen.layout.divider_offset().expect("divider laid out");
    assert_eq!(divider - screen.layout.scroll_top(), 1.0);
}
