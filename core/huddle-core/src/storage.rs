//! Storage configuration and path management for Huddle.
//!
//! All on-disk locations are derived from a single root so tests can point the
//! whole session at a temp directory.
//!
//! ```text
//! ~/.huddle/
//! ├── config.json          # SessionSettings overrides
//! ├── local-storage.json   # origin key-value store (pinnedChats, darkMode)
//! ├── channels.json        # channel snapshot used by the relay CLI
//! └── logs/                # rolling relay logs
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use fs_err as fs;
use tempfile::NamedTempFile;

use crate::error::{HuddleError, Result};

/// Central configuration for all Huddle storage paths.
///
/// Production code uses `StorageConfig::default()` which points to `~/.huddle/`.
/// Tests use `StorageConfig::with_root(temp_dir)` for isolation.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            root: home.join(".huddle"),
        }
    }
}

impl StorageConfig {
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to config.json (session settings).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Path to local-storage.json (the origin's key-value store).
    pub fn local_storage_file(&self) -> PathBuf {
        self.root.join("local-storage.json")
    }

    /// Path to channels.json (channel snapshot for replays).
    pub fn channels_file(&self) -> PathBuf {
        self.root.join("channels.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}

/// Writes `content` to `path` via a temp file in the same directory and a rename,
/// so readers never observe a partial file.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let io_err = |context: &str, source: std::io::Error| HuddleError::Io {
        context: format!("{} {}", context, path.display()),
        source,
    };

    let parent_dir = path
        .parent()
        .ok_or_else(|| HuddleError::InvalidStoragePath(path.to_path_buf()))?;
    fs::create_dir_all(parent_dir).map_err(|e| io_err("creating parent of", e))?;

    let mut temp_file =
        NamedTempFile::new_in(parent_dir).map_err(|e| io_err("creating temp file for", e))?;
    temp_file
        .write_all(content)
        .map_err(|e| io_err("writing", e))?;
    temp_file.flush().map_err(|e| io_err("flushing", e))?;
    temp_file
        .persist(path)
        .map_err(|e| io_err("committing", e.error))?;
    Ok(())
}
