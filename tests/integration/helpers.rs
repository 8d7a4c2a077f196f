use message_viewport::anchor::{Correction, ScrollAnchorController, ViewportFrame};
use message_viewport::app::ListLayout;
use message_viewport::config::ViewportConfig;
use message_viewport::history::{HistoryStore, MessageId, ThreadHistory, ThreadKey};
use message_viewport::loader::memory::MemoryHistorySource;
use message_viewport::loader::{HistoryLoader, LoaderEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub fn thread() -> ThreadKey {
    ThreadKey::main("general")
}

pub fn config(window_size: usize) -> ViewportConfig {
    ViewportConfig::default().with_window_size(window_size)
}

/// Store, loader and a remote seeded with `source`, thread already opened.
pub struct Harness {
    pub store: HistoryStore,
    pub loader: HistoryLoader,
    pub source: Arc<MemoryHistorySource>,
    pub events: mpsc::UnboundedReceiver<LoaderEvent>,
}

impl Harness {
    pub fn new(config: ViewportConfig, source: MemoryHistorySource) -> Self {
        Self::with_store(HistoryStore::new(config), source)
    }

    pub fn with_store(store: HistoryStore, source: MemoryHistorySource) -> Self {
        let source = Arc::new(source);
        let (loader, events) = HistoryLoader::new(store.clone(), source.clone());
        store.open_thread(&thread());
        Self { store, loader, source, events }
    }

    pub fn history(&self) -> Arc<ThreadHistory> {
        self.store.snapshot(&thread()).expect("thread record exists")
    }

    pub fn viewport_ids(&self) -> Vec<MessageId> {
        self.history().viewport.ids.to_vec()
    }

    pub fn listed_ids(&self) -> Vec<MessageId> {
        self.history().listed.as_slice().to_vec()
    }

    pub fn outlying_ids(&self) -> Option<Vec<MessageId>> {
        self.history().outlying.as_ref().map(|seq| seq.as_slice().to_vec())
    }

    /// Events queued so far, without waiting.
    pub fn drain_events(&mut self) -> Vec<LoaderEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Process loader events until `done` holds, failing after two seconds.
    pub async fn wait_until(&mut self, mut done: impl FnMut(&ThreadHistory) -> bool) {
        let store = self.store.clone();
        let events = &mut self.events;
        let waited = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if store.snapshot(&thread()).is_some_and(|history| done(&history)) {
                    return;
                }
                if events.recv().await.is_none() {
                    return;
                }
            }
        })
        .await;
        assert!(waited.is_ok(), "timed out waiting for history");
    }
}

pub fn range(from: MessageId, to: MessageId) -> Vec<MessageId> {
    (from..=to).collect()
}

/// Terminal list plus controller, synced the way the app does it.
pub struct Screen {
    pub layout: ListLayout,
    pub controller: ScrollAnchorController,
}

impl Screen {
    pub fn new(config: ViewportConfig, width: u16, height: u16) -> Self {
        let mut controller = ScrollAnchorController::new(config);
        controller.open(None, None);
        Self { layout: ListLayout::new(width, height), controller }
    }

    /// Capture, lay out the current viewport and correct.
    pub fn sync(&mut self, store: &HistoryStore) -> Correction {
        let history = store.snapshot(&thread()).expect("thread record exists");
        self.controller.capture(&self.layout, &history.viewport.ids);
        self.lay_out(store, &history)
    }

    /// Lay out and correct without capturing first.
    pub fn lay_out(&mut self, store: &HistoryStore, history: &ThreadHistory) -> Correction {
        let key = thread();
        self.layout.relayout(
            &history.viewport.ids,
            self.controller.unread_divider_id(),
            store.config().local_id_floor,
            |id| store.message(&key, id),
        );
        self.controller.correct(
            &mut self.layout,
            ViewportFrame { ids: &history.viewport.ids, is_newest: history.is_viewport_newest() },
        )
    }
}
