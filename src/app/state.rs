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

use super::layout::ListLayout;
use crate::anchor::{LayoutMeasure as _, ScrollAnchorController, ViewportFrame};
use crate::config::ViewportConfig;
use crate::history::{
    Direction, HistoryMessage, HistoryStore, MessageId, SequenceKind, ThreadHistory, ThreadKey,
};
use crate::loader::memory::MemoryHistorySource;
use crate::loader::{HistoryLoader, LoaderEvent};
use crate::offsets::ScrollOffsetStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Rows from either edge at which the next page is requested.
pub const EDGE_PREFETCH_ROWS: f64 = 6.0;

/// Events produced by the app's own background tasks.
#[derive(Debug)]
pub enum AppEvent {
    /// The simulated server accepted a locally sent message.
    LocalAcknowledged { local_id: MessageId, message: HistoryMessage },
}

/// Where to put the scroll position once the next viewport lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingFocus {
    Message(MessageId),
    Bottom,
}

pub struct App {
    pub thread: ThreadKey,
    pub store: HistoryStore,
    pub source: Arc<MemoryHistorySource>,
    pub loader: HistoryLoader,
    pub controller: ScrollAnchorController,
    pub offsets: ScrollOffsetStore,
    pub layout: ListLayout,
    /// Snapshot the layout was last built from.
    pub history: Arc<ThreadHistory>,
    pub loader_rx: mpsc::UnboundedReceiver<LoaderEvent>,
    pub app_tx: mpsc::UnboundedSender<AppEvent>,
    pub app_rx: mpsc::UnboundedReceiver<AppEvent>,
    pub jump_target: Option<MessageId>,
    pub pending_focus: Option<PendingFocus>,
    /// Last failure or notice shown in the footer.
    pub notice: Option<String>,
    pub should_quit: bool,
    pub latency: Duration,
    next_local_id: MessageId,
}

/// Policy scaled from pixels to terminal rows.
#[must_use]
pub fn terminal_config(base: ViewportConfig) -> ViewportConfig {
    ViewportConfig {
        bottom_threshold: 2.0,
        bottom_focus_margin: 0.0,
        divider_top: 1.0,
        divider_top_with_tools: 3.0,
        ..base
    }
}

impl App {
    #[must_use]
    pub fn new(
        thread: ThreadKey,
        store: HistoryStore,
        source: Arc<MemoryHistorySource>,
        latency: Duration,
        jump_target: Option<MessageId>,
    ) -> Self {
        let config = *store.config();
        let (loader, loader_rx) = HistoryLoader::new(store.clone(), source.clone());
        let (app_tx, app_rx) = mpsc::unbounded_channel();
        Self {
            thread,
            offsets: ScrollOffsetStore::new(store.clone()),
            store,
            source,
            loader,
            controller: ScrollAnchorController::new(config),
            layout: ListLayout::default(),
            history: Arc::default(),
            loader_rx,
            app_tx,
            app_rx,
            jump_target,
            pending_focus: None,
            notice: None,
            should_quit: false,
            latency,
            next_local_id: config.local_id_floor,
        }
    }

    // -----------------------------------------------------------------------
    // Thread lifecycle
    // -----------------------------------------------------------------------

    /// Mount the thread: seed the controller from the committed offset, fix
    /// the unread divider for this open, and load the newest slice.
    pub fn open_thread(&mut self) {
        self.store.open_thread(&self.thread);
        let cached_last = self.store.snapshot(&self.thread).and_then(|history| history.listed.last());
        let divider = cached_last.and_then(|last| self.source.first_after(&self.thread, last));
        self.controller.open(self.offsets.read_offset(&self.thread), divider);
        self.history = Arc::default();
        self.spawn_load(None, Direction::Around);
    }

    pub fn close_thread(&mut self) {
        self.offsets.flush_thread(&self.thread);
        self.store.close_thread(&self.thread);
    }

    // -----------------------------------------------------------------------
    // Viewport sync
    // -----------------------------------------------------------------------

    /// Rebuild the layout from the latest snapshot and correct the scroll
    /// position around the change.
    pub fn sync_viewport(&mut self) {
        let Some(history) = self.store.snapshot(&self.thread) else {
            return;
        };
        if Arc::ptr_eq(&history, &self.history) {
            return;
        }
        let ids_changed = *history.viewport.ids != *self.history.viewport.ids;
        let source_changed = history.viewport.source != self.history.viewport.source;
        if !ids_changed && !source_changed {
            // Loading flag or sequences outside the viewport; nothing moved.
            self.history = history;
            return;
        }
        self.controller.capture(&self.layout, &history.viewport.ids);
        self.history = history;
        self.relayout_and_correct();
    }

    /// Terminal size changed.
    pub fn resize(&mut self, width: u16, height: u16) {
        if self.layout.set_size(width, height) {
            self.relayout_and_correct();
        }
    }

    fn relayout_and_correct(&mut self) {
        let ids = Arc::clone(&self.history.viewport.ids);
        let store = &self.store;
        let thread = &self.thread;
        self.layout.relayout(
            &ids,
            self.controller.unread_divider_id(),
            store.config().local_id_floor,
            |id| store.message(thread, id),
        );
        self.controller.set_tools_visible(self.history.viewport.source == SequenceKind::Outlying);
        self.controller.correct(
            &mut self.layout,
            ViewportFrame { ids: &ids, is_newest: self.history.is_viewport_newest() },
        );
        self.apply_pending_focus();
    }

    fn apply_pending_focus(&mut self) {
        let focused = match self.pending_focus {
            Some(PendingFocus::Message(id)) => self.layout.center_on(id),
            Some(PendingFocus::Bottom) if self.history.is_viewport_newest() => {
                self.layout.scroll_to_bottom();
                true
            }
            _ => false,
        };
        if focused {
            self.pending_focus = None;
            self.record_scroll();
        }
    }

    // -----------------------------------------------------------------------
    // Scrolling
    // -----------------------------------------------------------------------

    pub fn scroll_by(&mut self, rows: f64) {
        self.layout.scroll_by(rows);
        self.record_scroll();
        self.prefetch_at_edges();
    }

    fn record_scroll(&mut self) {
        if let Some(offset) = self.controller.on_scroll(&self.layout) {
            self.offsets.persist_offset(&self.thread, offset, Instant::now());
        }
    }

    /// Ask for the adjacent page once the reader gets close to either edge.
    fn prefetch_at_edges(&mut self) {
        let viewport = &self.history.viewport;
        if viewport.is_empty() {
            return;
        }
        if self.layout.scroll_top() <= EDGE_PREFETCH_ROWS {
            self.spawn_load(viewport.first(), Direction::Backwards);
        } else if self.layout.rows_below() <= EDGE_PREFETCH_ROWS && !self.history.is_viewport_newest() {
            self.spawn_load(viewport.last(), Direction::Forwards);
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    pub fn jump(&mut self) {
        let Some(target) = self.jump_target else {
            self.notice = Some("no jump target, start with --jump <ID>".to_owned());
            return;
        };
        self.pending_focus = Some(PendingFocus::Message(target));
        self.spawn_load(Some(target), Direction::Around);
    }

    pub fn go_to_newest(&mut self) {
        self.pending_focus = Some(PendingFocus::Bottom);
        self.spawn_load(None, Direction::Around);
    }

    /// Simulate a message from someone else arriving.
    pub fn receive_message(&mut self) {
        let message = self.source.post(&self.thread, "bo", "a new message just arrived");
        self.loader.message_arrived(&self.thread, message);
    }

    /// Send a message: it shows up at once under a local id and is swapped
    /// for the server id when the simulated server acknowledges it.
    pub fn send_message(&mut self) {
        self.next_local_id += 1;
        let local_id = self.next_local_id;
        let text = format!("local message {}", local_id - self.store.config().local_id_floor);
        self.loader.message_arrived(&self.thread, HistoryMessage::new(local_id, "me", text.clone(), 0));

        let source = Arc::clone(&self.source);
        let thread = self.thread.clone();
        let app_tx = self.app_tx.clone();
        let latency = self.latency;
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            let message = source.post(&thread, "me", &text);
            let _ = app_tx.send(AppEvent::LocalAcknowledged { local_id, message });
        });
    }

    pub fn acknowledge_local(&mut self, local_id: MessageId, message: HistoryMessage) {
        let server_id = message.id;
        self.controller.transfer_anchor(local_id, server_id);
        self.store.insert_messages(&self.thread, [message]);
        self.loader.local_confirmed(&self.thread, local_id, server_id);
    }

    /// Delete the topmost visible message everywhere.
    pub fn delete_top_message(&mut self) {
        let Some(id) = self.layout.first_visible_id() else {
            return;
        };
        self.source.delete(&self.thread, &[id]);
        self.loader.messages_deleted(&self.thread, &[id]);
        self.notice = Some(format!("deleted #{id}"));
    }

    pub fn handle_loader_event(&mut self, event: LoaderEvent) {
        match event {
            LoaderEvent::ViewportChanged { thread } => {
                if thread == self.thread {
                    self.sync_viewport();
                }
            }
            LoaderEvent::FetchFailed { thread, direction } => {
                if thread == self.thread {
                    self.notice =
                        Some(format!("loading {direction:?} failed, scroll again to retry"));
                }
            }
            LoaderEvent::BudgetSettled { thread, direction } => {
                tracing::trace!(thread = %thread, ?direction, "budget pass settled");
            }
        }
    }

    pub fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::LocalAcknowledged { local_id, message } => {
                self.acknowledge_local(local_id, message);
            }
        }
    }

    fn spawn_load(&self, reference: Option<MessageId>, direction: Direction) {
        let loader = self.loader.clone();
        let thread = self.thread.clone();
        tokio::spawn(async move {
            let outcome = loader.ensure_viewport(&thread, reference, direction, false).await;
            tracing::debug!(thread = %thread, ?reference, ?direction, ?outcome, "viewport load finished");
        });
    }
}
