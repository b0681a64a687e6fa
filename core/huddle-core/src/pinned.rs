//! Pinned chats and the ordering they impose on chat lists.
//!
//! The pinned set is persisted under `pinnedChats` as a JSON array of unique IDs.
//! It is loaded once; every mutation writes the whole set before returning.
//! The in-memory set only changes after the write succeeds, so it never holds a
//! state that storage does not.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::collation::CollationLocale;
use crate::error::{HuddleError, Result};
use crate::kv::{KeyValueStore, PINNED_CHATS_KEY};

/// Anything that can appear in a chat list.
pub trait Named {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    pub name: String,
}

impl ChatSummary {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl Named for ChatSummary {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub struct PinnedChats {
    storage: Arc<dyn KeyValueStore>,
    pinned: BTreeSet<String>,
    collation: CollationLocale,
}

impl std::fmt::Debug for PinnedChats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinnedChats")
            .field("pinned", &self.pinned)
            .field("collation", &self.collation)
            .finish()
    }
}

fn read_pinned(storage: &dyn KeyValueStore) -> BTreeSet<String> {
    let Some(raw) = storage.get(PINNED_CHATS_KEY) else {
        return BTreeSet::new();
    };
    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(ids) => ids.into_iter().collect(),
        Err(err) => {
            warn!(error = %err, "Corrupt pinned chats, starting empty");
            BTreeSet::new()
        }
    }
}

impl PinnedChats {
    pub fn load(storage: Arc<dyn KeyValueStore>, collation: CollationLocale) -> Self {
        let pinned = read_pinned(storage.as_ref());
        Self {
            storage,
            pinned,
            collation,
        }
    }

    /// Re-reads the set from storage, discarding the in-memory copy.
    pub fn reload(&mut self) {
        self.pinned = read_pinned(self.storage.as_ref());
    }

    pub fn is_pinned(&self, id: &str) -> bool {
        self.pinned.contains(id)
    }

    /// Returns `true` if the set changed.
    pub fn pin_chat(&mut self, id: &str) -> Result<bool> {
        if self.pinned.contains(id) {
            return Ok(false);
        }
        let mut next = self.pinned.clone();
        next.insert(id.to_string());
        self.commit(next)?;
        Ok(true)
    }

    /// Returns `true` if the set changed.
    pub fn unpin_chat(&mut self, id: &str) -> Result<bool> {
        if !self.pinned.contains(id) {
            return Ok(false);
        }
        let mut next = self.pinned.clone();
        next.remove(id);
        self.commit(next)?;
        Ok(true)
    }

    /// Flips membership. Returns whether `id` is pinned afterwards.
    pub fn toggle_pin(&mut self, id: &str) -> Result<bool> {
        if self.is_pinned(id) {
            self.unpin_chat(id)?;
            Ok(false)
        } else {
            self.pin_chat(id)?;
            Ok(true)
        }
    }

    pub fn clear_all_pinned(&mut self) -> Result<()> {
        self.commit(BTreeSet::new())
    }

    /// Pinned items first, then the rest; each group ordered by collated name.
    /// Items with identical names keep their input order.
    pub fn sort_with_pinned<T: Named>(&self, mut items: Vec<T>) -> Vec<T> {
        items.sort_by_cached_key(|item| {
            (
                !self.pinned.contains(item.id()),
                self.collation.key(item.name()),
            )
        });
        items
    }

    pub fn pinned_ids(&self) -> Vec<String> {
        self.pinned.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }

    fn commit(&mut self, next: BTreeSet<String>) -> Result<()> {
        let ids: Vec<&String> = next.iter().collect();
        let payload = serde_json::to_string(&ids).map_err(|source| HuddleError::Json {
            context: "serializing pinned chats".to_string(),
            source,
        })?;
        self.storage.set(PINNED_CHATS_KEY, &payload)?;
        self.pinned = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryOrigin;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn fresh() -> (MemoryOrigin, PinnedChats) {
        let origin = MemoryOrigin::new();
        let pins = PinnedChats::load(Arc::new(origin.open_tab()), CollationLocale::Vietnamese);
        (origin, pins)
    }

    fn names<T: Named>(items: &[T]) -> Vec<&str> {
        items.iter().map(|i| i.name()).collect()
    }

    #[test]
    fn pinned_item_comes_first_then_alphabetical() {
        let (_origin, mut pins) = fresh();
        pins.pin_chat("2").unwrap();

        let items = vec![
            ChatSummary::new("1", "Bao"),
            ChatSummary::new("2", "An"),
            ChatSummary::new("3", "Chi"),
        ];
        let sorted = pins.sort_with_pinned(items);
        assert_eq!(names(&sorted), vec!["An", "Bao", "Chi"]);
    }

    #[test]
    fn pinned_partition_precedes_alphabet() {
        let (_origin, mut pins) = fresh();
        pins.pin_chat("z").unwrap();
        pins.pin_chat("y").unwrap();

        let items = vec![
            ChatSummary::new("a", "An"),
            ChatSummary::new("z", "Zed"),
            ChatSummary::new("b", "bình"),
            ChatSummary::new("y", "Đạt"),
        ];
        let sorted = pins.sort_with_pinned(items);
        assert_eq!(names(&sorted), vec!["Đạt", "Zed", "An", "bình"]);
    }

    #[test]
    fn equal_names_keep_input_order() {
        let (_origin, pins) = fresh();
        let items = vec![ChatSummary::new("1", "Team"), ChatSummary::new("2", "Team")];
        let sorted = pins.sort_with_pinned(items);
        assert_eq!(sorted[0].id, "1");
        assert_eq!(sorted[1].id, "2");
    }

    #[test]
    fn pin_and_unpin_are_idempotent() {
        let (_origin, mut pins) = fresh();
        assert!(pins.pin_chat("x").unwrap());
        assert!(!pins.pin_chat("x").unwrap());
        assert_eq!(pins.len(), 1);
        assert!(pins.unpin_chat("x").unwrap());
        assert!(!pins.unpin_chat("x").unwrap());
        assert!(pins.is_empty());
    }

    #[test]
    fn toggle_flips_membership() {
        let (_origin, mut pins) = fresh();
        assert!(pins.toggle_pin("x").unwrap());
        assert!(pins.is_pinned("x"));
        assert!(!pins.toggle_pin("x").unwrap());
        assert!(!pins.is_pinned("x"));
    }

    #[test]
    fn mutations_persist_and_reload() {
        let origin = MemoryOrigin::new();
        let storage: Arc<dyn KeyValueStore> = Arc::new(origin.open_tab());

        let mut pins = PinnedChats::load(Arc::clone(&storage), CollationLocale::Vietnamese);
        pins.pin_chat("x").unwrap();
        pins.pin_chat("y").unwrap();

        let reloaded = PinnedChats::load(Arc::clone(&storage), CollationLocale::Vietnamese);
        assert!(reloaded.is_pinned("x"));
        assert!(reloaded.is_pinned("y"));

        pins.clear_all_pinned().unwrap();
        let reloaded = PinnedChats::load(storage, CollationLocale::Vietnamese);
        assert!(reloaded.is_empty());
    }

    #[test]
    fn persisted_form_is_array_of_unique_ids() {
        let origin = MemoryOrigin::new();
        let tab = origin.open_tab();
        let mut pins = PinnedChats::load(Arc::new(tab.clone()), CollationLocale::Vietnamese);
        pins.pin_chat("b").unwrap();
        pins.pin_chat("a").unwrap();
        pins.pin_chat("a").unwrap();

        let raw = tab.get(PINNED_CHATS_KEY).unwrap();
        let mut ids: Vec<String> = serde_json::from_str(&raw).unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn corrupt_storage_loads_empty() {
        let origin = MemoryOrigin::new();
        let tab = origin.open_tab();
        tab.set(PINNED_CHATS_KEY, "{\"oops\":").unwrap();

        let pins = PinnedChats::load(Arc::new(tab), CollationLocale::Vietnamese);
        assert!(pins.is_empty());
    }

    #[test]
    fn duplicate_ids_in_storage_collapse() {
        let origin = MemoryOrigin::new();
        let tab = origin.open_tab();
        tab.set(PINNED_CHATS_KEY, r#"["a","a","b"]"#).unwrap();

        let pins = PinnedChats::load(Arc::new(tab), CollationLocale::Vietnamese);
        assert_eq!(pins.pinned_ids(), vec!["a", "b"]);
    }

    struct FailingStore {
        fail: AtomicBool,
    }

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&self, key: &str, _value: &str) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(HuddleError::Storage {
                    key: key.to_string(),
                    details: "disk full".to_string(),
                });
            }
            Ok(())
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_leaves_set_unchanged() {
        let store = Arc::new(FailingStore {
            fail: AtomicBool::new(true),
        });
        let mut pins = PinnedChats::load(store.clone(), CollationLocale::Vietnamese);

        assert!(pins.pin_chat("x").is_err());
        assert!(!pins.is_pinned("x"));

        store.fail.store(false, Ordering::SeqCst);
        assert!(pins.pin_chat("x").unwrap());
        assert!(pins.is_pinned("x"));
    }

    #[test]
    fn reload_picks_up_other_tab_writes() {
        let origin = MemoryOrigin::new();
        let mut first = PinnedChats::load(Arc::new(origin.open_tab()), CollationLocale::Vietnamese);
        let mut second =
            PinnedChats::load(Arc::new(origin.open_tab()), CollationLocale::Vietnamese);

        second.pin_chat("shared").unwrap();
        assert!(!first.is_pinned("shared"));
        first.reload();
        assert!(first.is_pinned("shared"));
    }
}
