//! Dark-mode preference shared across tabs.
//!
//! Storage (`darkMode`, a JSON boolean) is authoritative across page loads. Within
//! a tab the in-memory flag is authoritative until an outside change is seen:
//! a storage change from another tab, an in-page preference event, or a poll that
//! finds a different stored value. Then storage is re-read and overwrites memory.
//! Last writer wins; there is no merge.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::kv::{KeyValueStore, StorageChange, DARK_MODE_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn from_dark_mode(dark: bool) -> Self {
        if dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// The only handle this module has on rendering.
pub trait ThemeApplier {
    fn apply_theme(&mut self, theme: Theme);
}

/// Class set of the document root.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClassList {
    classes: BTreeSet<String>,
}

impl ClassList {
    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn classes(&self) -> Vec<&str> {
        self.classes.iter().map(String::as_str).collect()
    }
}

impl ThemeApplier for ClassList {
    fn apply_theme(&mut self, theme: Theme) {
        self.classes.remove(theme.opposite().class_name());
        self.classes.insert(theme.class_name().to_string());
    }
}

pub struct PreferenceSync<A: ThemeApplier = ClassList> {
    storage: Arc<dyn KeyValueStore>,
    applier: A,
    dark_mode: bool,
}

fn read_stored(storage: &dyn KeyValueStore) -> Option<bool> {
    let raw = storage.get(DARK_MODE_KEY)?;
    match serde_json::from_str::<bool>(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(value = %raw, error = %err, "Ignoring malformed darkMode value");
            None
        }
    }
}

impl<A: ThemeApplier> PreferenceSync<A> {
    /// Reads the stored preference (or `default_dark_mode`), then writes and
    /// applies it.
    pub fn mount(storage: Arc<dyn KeyValueStore>, applier: A, default_dark_mode: bool) -> Self {
        let dark_mode = read_stored(storage.as_ref()).unwrap_or(default_dark_mode);
        let mut sync = Self {
            storage,
            applier,
            dark_mode,
        };
        sync.publish();
        sync
    }

    pub fn is_dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn theme(&self) -> Theme {
        Theme::from_dark_mode(self.dark_mode)
    }

    pub fn applier(&self) -> &A {
        &self.applier
    }

    /// Returns the new value.
    pub fn toggle(&mut self) -> bool {
        self.set(!self.dark_mode);
        self.dark_mode
    }

    pub fn set(&mut self, dark_mode: bool) {
        if self.dark_mode == dark_mode {
            return;
        }
        self.dark_mode = dark_mode;
        self.publish();
    }

    /// Handles a storage change made by another tab.
    pub fn on_storage_change(&mut self, change: &StorageChange) -> bool {
        if change.key != DARK_MODE_KEY {
            return false;
        }
        self.refresh_from_storage()
    }

    /// Handles the in-page "preference changed" signal.
    pub fn on_preference_event(&mut self) -> bool {
        self.refresh_from_storage()
    }

    /// Polling fallback for stores that cannot push change events.
    pub fn poll(&mut self) -> bool {
        self.refresh_from_storage()
    }

    fn refresh_from_storage(&mut self) -> bool {
        match read_stored(self.storage.as_ref()) {
            Some(stored) if stored != self.dark_mode => {
                debug!(dark_mode = stored, "Preference changed outside this tab");
                self.dark_mode = stored;
                self.applier.apply_theme(self.theme());
                true
            }
            _ => false,
        }
    }

    fn publish(&mut self) {
        let value = if self.dark_mode { "true" } else { "false" };
        if let Err(err) = self.storage.set(DARK_MODE_KEY, value) {
            warn!(error = %err, "Failed to persist darkMode");
        }
        self.applier.apply_theme(self.theme());
    }
}
