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

//! Shared, copy-on-write state container for thread histories.
//!
//! Records are stored as `Arc<ThreadHistory>`. Readers clone the `Arc` and keep
//! a consistent snapshot; writers mutate through `Arc::make_mut` under one write
//! lock, so a reader sees either the whole update or none of it.

use super::ids::{IdSequence, MessageId};
use super::message::HistoryMessage;
use super::thread::{HistoryUpdate, ThreadHistory, ThreadKey};
use crate::config::ViewportConfig;
use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

const STATE_DIR_NAME: &str = "message-viewport";
const STATE_FILE: &str = "state.json";
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Default)]
struct ThreadEntry {
    history: Arc<ThreadHistory>,
    /// Bumped on every open so late fetch results can be recognized.
    generation: u64,
    is_open: bool,
}

#[derive(Debug, Default)]
struct StoreState {
    threads: HashMap<ThreadKey, ThreadEntry>,
    offsets: HashMap<ThreadKey, f64>,
    messages: HashMap<ThreadKey, BTreeMap<MessageId, Arc<HistoryMessage>>>,
}

/// Cheap-to-clone handle to the shared store.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    state: Arc<RwLock<StoreState>>,
    config: ViewportConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreSnapshot {
    version: u32,
    threads: Vec<ThreadSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ThreadSnapshot {
    key: ThreadKey,
    listed: IdSequence,
    #[serde(default)]
    outlying: Option<IdSequence>,
    #[serde(default)]
    scroll_offset: Option<f64>,
    /// Bodies of the cached ids, ascending by id.
    #[serde(default)]
    messages: Vec<HistoryMessage>,
}

impl HistoryStore {
    #[must_use]
    pub fn new(config: ViewportConfig) -> Self {
        Self { state: Arc::default(), config }
    }

    #[must_use]
    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Thread lifecycle
    // -----------------------------------------------------------------------

    /// Mount a thread, creating its record if needed. Returns the generation
    /// that fetches started from now on must present to publish results.
    pub fn open_thread(&self, key: &ThreadKey) -> u64 {
        let mut state = self.write();
        let entry = state.threads.entry(key.clone()).or_default();
        entry.generation += 1;
        entry.is_open = true;
        tracing::info!(thread = %key, generation = entry.generation, "thread opened");
        entry.generation
    }

    /// Unmount a thread. The viewport and any outlying run are dropped; the
    /// listed run stays as cached history for the next open.
    pub fn close_thread(&self, key: &ThreadKey) {
        let mut state = self.write();
        if let Some(entry) = state.threads.get_mut(key) {
            entry.is_open = false;
            entry.generation += 1;
            let history = Arc::make_mut(&mut entry.history);
            history.outlying = None;
            history.viewport = Default::default();
            history.is_loading = false;
            tracing::info!(thread = %key, "thread closed");
        }
    }

    #[must_use]
    pub fn is_current(&self, key: &ThreadKey, generation: u64) -> bool {
        self.read()
            .threads
            .get(key)
            .is_some_and(|entry| entry.is_open && entry.generation == generation)
    }

    #[must_use]
    pub fn generation(&self, key: &ThreadKey) -> Option<u64> {
        self.read().threads.get(key).filter(|entry| entry.is_open).map(|entry| entry.generation)
    }

    // -----------------------------------------------------------------------
    // History records
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn snapshot(&self, key: &ThreadKey) -> Option<Arc<ThreadHistory>> {
        self.read().threads.get(key).map(|entry| Arc::clone(&entry.history))
    }

    /// Apply one update to an existing thread record.
    pub fn update(&self, key: &ThreadKey, update: HistoryUpdate) -> bool {
        self.modify(key, None, |history, config| history.apply(update, config)).unwrap_or(false)
    }

    /// Run `f` against the thread record under the write lock.
    ///
    /// With `generation` set, `f` only runs while that generation is still the
    /// mounted one. Returns `None` when the record is missing or stale.
    pub fn modify<R>(
        &self,
        key: &ThreadKey,
        generation: Option<u64>,
        f: impl FnOnce(&mut ThreadHistory, &ViewportConfig) -> R,
    ) -> Option<R> {
        let mut state = self.write();
        let entry = state.threads.get_mut(key)?;
        if let Some(generation) = generation
            && (!entry.is_open || entry.generation != generation)
        {
            return None;
        }
        Some(f(Arc::make_mut(&mut entry.history), &self.config))
    }

    /// Remove ids everywhere, including their bodies.
    pub fn delete_messages(&self, key: &ThreadKey, ids: &[MessageId]) -> bool {
        let changed = self.update(key, HistoryUpdate::MessagesDeleted(ids.to_vec()));
        if let Some(bodies) = self.write().messages.get_mut(key) {
            for id in ids {
                bodies.remove(id);
            }
        }
        changed
    }

    // -----------------------------------------------------------------------
    // Message bodies
    // -----------------------------------------------------------------------

    pub fn insert_messages(&self, key: &ThreadKey, messages: impl IntoIterator<Item = HistoryMessage>) {
        let mut state = self.write();
        let bodies = state.messages.entry(key.clone()).or_default();
        for message in messages {
            bodies.insert(message.id, Arc::new(message));
        }
    }

    /// Move a body stored under a local id to its acknowledged id.
    pub fn rekey_message(&self, key: &ThreadKey, from: MessageId, to: MessageId) {
        let mut state = self.write();
        if let Some(bodies) = state.messages.get_mut(key)
            && let Some(body) = bodies.remove(&from)
        {
            let mut body = Arc::unwrap_or_clone(body);
            body.id = to;
            bodies.insert(to, Arc::new(body));
        }
    }

    #[must_use]
    pub fn message(&self, key: &ThreadKey, id: MessageId) -> Option<Arc<HistoryMessage>> {
        self.read().messages.get(key).and_then(|bodies| bodies.get(&id)).cloned()
    }

    // -----------------------------------------------------------------------
    // Scroll offsets
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn scroll_offset(&self, key: &ThreadKey) -> Option<f64> {
        self.read().offsets.get(key).copied()
    }

    pub fn set_scroll_offset(&self, key: &ThreadKey, offset: f64) {
        if !offset.is_finite() {
            tracing::warn!(thread = %key, offset, "refusing to store non-finite scroll offset");
            return;
        }
        self.write().offsets.insert(key.clone(), offset.max(0.0));
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Default location of the persisted snapshot.
    #[must_use]
    pub fn default_state_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(STATE_DIR_NAME).join(STATE_FILE))
    }

    /// Restore a store from `path`. A missing file yields an empty store.
    pub fn load(path: &Path, config: ViewportConfig) -> anyhow::Result<Self> {
        let store = Self::new(config);
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        let snapshot: StoreSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("failed to decode state file {}", path.display()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            anyhow::bail!("unsupported state file version {}", snapshot.version);
        }

        {
            let mut state = store.write();
            for thread in snapshot.threads {
                if let Some(offset) = thread.scroll_offset {
                    state.offsets.insert(thread.key.clone(), offset);
                }
                let bodies: BTreeMap<MessageId, Arc<HistoryMessage>> = thread
                    .messages
                    .into_iter()
                    .map(|message| (message.id, Arc::new(message)))
                    .collect();
                // Ids count as local history only together with their bodies.
                let has_bodies =
                    |ids: &IdSequence| ids.as_slice().iter().all(|id| bodies.contains_key(id));
                let listed = if has_bodies(&thread.listed) {
                    thread.listed
                } else {
                    tracing::debug!(thread = %thread.key, "cached ids without bodies, dropping them");
                    IdSequence::default()
                };
                let outlying = thread.outlying.filter(|outlying| has_bodies(outlying));
                let history = ThreadHistory { listed, outlying, ..ThreadHistory::default() };
                if !bodies.is_empty() {
                    state.messages.insert(thread.key.clone(), bodies);
                }
                state.threads.insert(
                    thread.key,
                    ThreadEntry { history: Arc::new(history), generation: 0, is_open: false },
                );
            }
            tracing::info!(threads = state.threads.len(), path = %path.display(), "state restored");
        }
        Ok(store)
    }

    /// Write the id sequences, their message bodies and the scroll offsets of
    /// every thread to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let snapshot = {
            let state = self.read();
            let mut threads: Vec<ThreadSnapshot> = state
                .threads
                .iter()
                .map(|(key, entry)| ThreadSnapshot {
                    key: key.clone(),
                    listed: entry.history.listed.clone(),
                    outlying: entry.history.outlying.clone(),
                    scroll_offset: state.offsets.get(key).copied(),
                    messages: state
                        .messages
                        .get(key)
                        .map(|bodies| bodies.values().map(|body| HistoryMessage::clone(body)).collect())
                        .unwrap_or_default(),
                })
                .collect();
            threads.sort_by(|a, b| a.key.cmp(&b.key));
            StoreSnapshot { version: SNAPSHOT_VERSION, threads }
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_vec(&snapshot).context("failed to encode state")?;
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::SequenceKind;
    use pretty_assertions::assert_eq;

    fn key() -> ThreadKey {
        ThreadKey::main("chat-1")
    }

    #[test]
    fn snapshot_is_stable_across_updates() {
        let store = HistoryStore::new(ViewportConfig::default());
        store.open_thread(&key());
        store.update(
            &key(),
            HistoryUpdate::Merge {
                ids: vec![1, 2, 3],
                into: SequenceKind::Listed,
                reached_newest: true,
                total_count: None,
            },
        );
        let before = store.snapshot(&key()).unwrap();

        store.update(&key(), HistoryUpdate::MessageArrived(4));

        assert_eq!(before.listed.as_slice(), &[1, 2, 3]);
        assert_eq!(store.snapshot(&key()).unwrap().listed.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn stale_generation_is_rejected() {
        let store = HistoryStore::new(ViewportConfig::default());
        let first = store.open_thread(&key());
        store.close_thread(&key());
        let second = store.open_thread(&key());

        assert!(!store.is_current(&key(), first));
        assert!(store.is_current(&key(), second));
        assert!(store.modify(&key(), Some(first), |_, _| ()).is_none());
        assert!(store.modify(&key(), Some(second), |_, _| ()).is_some());
    }

    #[test]
    fn close_keeps_listed_and_drops_outlying() {
        let store = HistoryStore::new(ViewportConfig::default());
        store.open_thread(&key());
        store.modify(&key(), None, |history, config| {
            history.apply(
                HistoryUpdate::Merge {
                    ids: vec![100, 101],
                    into: SequenceKind::Listed,
                    reached_newest: true,
                    total_count: None,
                },
                config,
            );
            history.apply(
                HistoryUpdate::Merge {
                    ids: vec![5, 6],
                    into: SequenceKind::Outlying,
                    reached_newest: false,
                    total_count: None,
                },
                config,
            );
        });

        store.close_thread(&key());

        let history = store.snapshot(&key()).unwrap();
        assert_eq!(history.listed.as_slice(), &[100, 101]);
        assert!(history.outlying.is_none());
        assert!(history.viewport.is_empty());
    }

    #[test]
    fn rekey_moves_local_body() {
        let store = HistoryStore::new(ViewportConfig::default());
        let local = crate::config::LOCAL_ID_FLOOR + 1;
        store.insert_messages(&key(), [HistoryMessage::new(local, "me", "draft", 0)]);
        store.rekey_message(&key(), local, 77);
        assert!(store.message(&key(), local).is_none());
        assert_eq!(store.message(&key(), 77).unwrap().text, "draft");
    }

    #[test]
    fn save_and_load_restore_sequences_and_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let store = HistoryStore::new(ViewportConfig::default());
        store.open_thread(&key());
        store.update(
            &key(),
            HistoryUpdate::Merge {
                ids: vec![7, 8, 9],
                into: SequenceKind::Listed,
                reached_newest: true,
                total_count: None,
            },
        );
        store.insert_messages(&key(), [7, 8, 9].map(|id| HistoryMessage::new(id, "ann", "hi", 0)));
        store.set_scroll_offset(&key(), 312.5);
        store.save(&path).unwrap();

        let restored = HistoryStore::load(&path, ViewportConfig::default()).unwrap();

        assert_eq!(restored.snapshot(&key()).unwrap().listed.as_slice(), &[7, 8, 9]);
        assert_eq!(restored.message(&key(), 8).unwrap().text, "hi");
        assert_eq!(restored.scroll_offset(&key()), Some(312.5));
        assert!(restored.generation(&key()).is_none());
    }

    #[test]
    fn ids_without_bodies_are_not_restored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = HistoryStore::new(ViewportConfig::default());
        store.open_thread(&key());
        store.update(
            &key(),
            HistoryUpdate::Merge {
                ids: vec![7, 8, 9],
                into: SequenceKind::Listed,
                reached_newest: true,
                total_count: None,
            },
        );
        store.insert_messages(&key(), [HistoryMessage::new(7, "ann", "hi", 0)]);
        store.set_scroll_offset(&key(), 40.0);
        store.save(&path).unwrap();

        let restored = HistoryStore::load(&path, ViewportConfig::default()).unwrap();

        assert!(restored.snapshot(&key()).unwrap().listed.is_empty());
        assert_eq!(restored.scroll_offset(&key()), Some(40.0));
    }

    #[test]
    fn missing_state_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::load(&dir.path().join("absent.json"), ViewportConfig::default());
        assert!(store.unwrap().snapshot(&key()).is_none());
    }

    #[test]
    fn corrupt_state_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(HistoryStore::load(&path, ViewportConfig::default()).is_err());
    }
}
