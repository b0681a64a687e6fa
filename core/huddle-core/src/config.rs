//! Session settings loading.
//!
//! Every field has a default, so a missing or partial `config.json` still
//! yields a usable configuration. Corrupt files fall back to defaults.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::collation::CollationLocale;
use crate::storage::StorageConfig;

pub const DEFAULT_DEBOUNCE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_COOLDOWN_MS: u64 = 2_000;
pub const DEFAULT_TOAST_DURATION_MS: u64 = 3_000;
pub const DEFAULT_LEDGER_RETENTION_MS: u64 = 5 * 60 * 1_000;

/// Tunables for one chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSettings {
    /// Quiet period before a coalesced toast fires.
    pub debounce_delay_ms: u64,
    /// Window after a fire during which the same toast key is dropped.
    pub cooldown_ms: u64,
    /// How long a toast stays on screen when the caller gives no duration.
    pub toast_duration_ms: u64,
    /// How long a processed event key is remembered.
    pub ledger_retention_ms: u64,
    /// Theme used when storage holds no preference.
    pub default_dark_mode: bool,
    pub collation: CollationLocale,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            debounce_delay_ms: DEFAULT_DEBOUNCE_DELAY_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            toast_duration_ms: DEFAULT_TOAST_DURATION_MS,
            ledger_retention_ms: DEFAULT_LEDGER_RETENTION_MS,
            default_dark_mode: true,
            collation: CollationLocale::Vietnamese,
        }
    }
}

/// Loads settings, returning defaults if the file is missing or unreadable.
pub fn load_settings_with_storage(storage: &StorageConfig) -> SessionSettings {
    let path = storage.config_file();
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return SessionSettings::default(),
    };

    match serde_json::from_str(&content) {
        Ok(settings) => settings,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Malformed config, using defaults");
            SessionSettings::default()
        }
    }
}
