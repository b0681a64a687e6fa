//! Origin-scoped key-value storage.
//!
//! Mirrors browser local storage: string keys and string values (JSON text),
//! shared by every tab of the same origin, last write wins, and a write notifies
//! every *other* tab with a [`StorageChange`]. The writing tab is never notified.
//!
//! Two implementations:
//! - [`MemoryOrigin`] / [`TabStorage`]: in-memory origin with per-tab change queues.
//! - [`FileStore`]: one JSON object file, written atomically (temp file + rename).
//!   Other processes see writes on their next read; there are no change events,
//!   so readers rely on polling.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use fs_err as fs;
use tracing::{debug, warn};

use crate::error::{HuddleError, Result};
use crate::storage::write_atomic;

pub const PINNED_CHATS_KEY: &str = "pinnedChats";
pub const DARK_MODE_KEY: &str = "darkMode";

/// Changes kept per tab before the oldest are dropped.
pub const MAX_PENDING_CHANGES: usize = 1024;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// A change made by another tab of the same origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-memory origin
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct OriginState {
    values: HashMap<String, String>,
    inboxes: HashMap<u64, VecDeque<StorageChange>>,
    next_tab: u64,
}

impl OriginState {
    fn write(&mut self, writer: u64, key: &str, new_value: Option<String>) {
        let old_value = match &new_value {
            Some(value) => self.values.insert(key.to_string(), value.clone()),
            None => self.values.remove(key),
        };
        if old_value == new_value {
            return;
        }
        let change = StorageChange {
            key: key.to_string(),
            old_value,
            new_value,
        };
        for (tab, inbox) in self.inboxes.iter_mut() {
            if *tab == writer {
                continue;
            }
            if inbox.len() >= MAX_PENDING_CHANGES {
                inbox.pop_front();
                debug!(tab = *tab, key, "Tab inbox full, dropping oldest change");
            }
            inbox.push_back(change.clone());
        }
    }
}

/// Shared storage for one origin. Open a [`TabStorage`] per tab.
#[derive(Debug, Default, Clone)]
pub struct MemoryOrigin {
    state: Arc<Mutex<OriginState>>,
}

impl MemoryOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_tab(&self) -> TabStorage {
        let mut state = lock(&self.state);
        let tab = state.next_tab;
        state.next_tab += 1;
        state.inboxes.insert(tab, VecDeque::new());
        TabStorage {
            state: Arc::clone(&self.state),
            tab,
        }
    }

    /// Raw write that bypasses every tab, as if made by another device profile.
    /// All open tabs are notified.
    pub fn set_external(&self, key: &str, value: &str) {
        lock(&self.state).write(u64::MAX, key, Some(value.to_string()));
    }

    pub fn tab_count(&self) -> usize {
        lock(&self.state).inboxes.len()
    }
}

/// One tab's view of a [`MemoryOrigin`]. Clones belong to the same tab.
///
/// A tab must drain its changes regularly or [`close`](Self::close) itself.
/// At most [`MAX_PENDING_CHANGES`] are queued; older ones are dropped, so a
/// lagging reader should re-read the keys it cares about.
#[derive(Debug, Clone)]
pub struct TabStorage {
    state: Arc<Mutex<OriginState>>,
    tab: u64,
}

impl TabStorage {
    /// Takes the changes other tabs made since the last drain, oldest first.
    pub fn drain_changes(&self) -> Vec<StorageChange> {
        let mut state = lock(&self.state);
        state
            .inboxes
            .get_mut(&self.tab)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }

    /// Stops delivering changes to this tab.
    pub fn close(&self) {
        lock(&self.state).inboxes.remove(&self.tab);
    }
}

impl KeyValueStore for TabStorage {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.state).values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.state).write(self.tab, key, Some(value.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.state).write(self.tab, key, None);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// File-backed store
// ═══════════════════════════════════════════════════════════════════════════════

/// Key-value store persisted as a single JSON object.
///
/// Missing, empty or corrupt files read as empty. Writes re-read the file first
/// so keys written by other processes survive.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> BTreeMap<String, String> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Failed to read storage file");
                return BTreeMap::new();
            }
        };

        if content.trim().is_empty() {
            return BTreeMap::new();
        }

        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Corrupt storage file, treating as empty"
                );
                BTreeMap::new()
            }
        }
    }

    fn write_map(&self, key: &str, map: &BTreeMap<String, String>) -> Result<()> {
        let content = serde_json::to_vec_pretty(map).map_err(|source| HuddleError::Json {
            context: format!("serializing {}", self.path.display()),
            source,
        })?;
        write_atomic(&self.path, &content).map_err(|err| HuddleError::Storage {
            key: key.to_string(),
            details: err.to_string(),
        })
    }

    fn update(&self, key: &str, value: Option<&str>) -> Result<()> {
        let _guard = lock(&self.write_lock);
        let mut map = self.read_map();
        match value {
            Some(value) => {
                map.insert(key.to_string(), value.to_string());
            }
            None => {
                if map.remove(key).is_none() {
                    return Ok(());
                }
            }
        }
        self.write_map(key, &map)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read_map().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(key, Some(value))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(key, None)
    }
}
