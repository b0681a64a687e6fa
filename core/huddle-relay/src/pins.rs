//! Pinned chat management and chat list ordering.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use clap::Subcommand;
use fs_err as fs;
use huddle_core::{load_settings_with_storage, ChatSummary, FileStore, PinnedChats, StorageConfig};

#[derive(Subcommand)]
pub enum PinsAction {
    /// Print pinned chat IDs
    List,
    /// Pin a chat
    Add { id: String },
    /// Unpin a chat
    Remove { id: String },
    /// Flip a chat's pinned state
    Toggle { id: String },
    /// Unpin everything
    Clear,
}

fn open(storage: &StorageConfig) -> PinnedChats {
    let settings = load_settings_with_storage(storage);
    let store = Arc::new(FileStore::new(&storage.local_storage_file()));
    PinnedChats::load(store, settings.collation)
}

pub fn run(storage: &StorageConfig, action: PinsAction) -> Result<(), String> {
    let mut pins = open(storage);
    match action {
        PinsAction::List => {
            for id in pins.pinned_ids() {
                println!("{}", id);
            }
        }
        PinsAction::Add { id } => {
            if !pins.pin_chat(&id)? {
                tracing::info!(chat = %id, "Already pinned");
            }
        }
        PinsAction::Remove { id } => {
            if !pins.unpin_chat(&id)? {
                tracing::info!(chat = %id, "Was not pinned");
            }
        }
        PinsAction::Toggle { id } => {
            let pinned = pins.toggle_pin(&id)?;
            println!("{}", if pinned { "pinned" } else { "unpinned" });
        }
        PinsAction::Clear => pins.clear_all_pinned()?,
    }
    Ok(())
}

pub fn sort(storage: &StorageConfig, input: &Path) -> Result<(), String> {
    let content =
        fs::read_to_string(input).map_err(|e| format!("Failed to read chat list: {}", e))?;
    let sorted = sort_chat_list(&open(storage), &content)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &sorted)
        .map_err(|e| format!("Failed to write chat list: {}", e))?;
    writeln!(out).map_err(|e| format!("Failed to write chat list: {}", e))
}

fn sort_chat_list(pins: &PinnedChats, content: &str) -> Result<Vec<ChatSummary>, String> {
    let chats: Vec<ChatSummary> =
        serde_json::from_str(content).map_err(|e| format!("Failed to parse chat list: {}", e))?;
    Ok(pins.sort_with_pinned(chats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn pins_persist_between_invocations() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());

        run(&storage, PinsAction::Add { id: "c-2".to_string() }).unwrap();
        run(&storage, PinsAction::Toggle { id: "c-1".to_string() }).unwrap();
        run(&storage, PinsAction::Remove { id: "c-2".to_string() }).unwrap();

        assert_eq!(open(&storage).pinned_ids(), vec!["c-1".to_string()]);

        run(&storage, PinsAction::Clear).unwrap();
        assert!(open(&storage).is_empty());
    }

    #[test]
    fn sorted_list_puts_pins_first() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        run(&storage, PinsAction::Add { id: "c-3".to_string() }).unwrap();

        let content = r#"[
            {"id": "c-1", "name": "Đức"},
            {"id": "c-2", "name": "Dung"},
            {"id": "c-3", "name": "Yến"},
            {"id": "c-4", "name": "ân"}
        ]"#;
        let sorted = sort_chat_list(&open(&storage), content).unwrap();
        let ids: Vec<&str> = sorted.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c-3", "c-4", "c-2", "c-1"]);
    }

    #[test]
    fn malformed_chat_list_is_an_error() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        assert!(sort_chat_list(&open(&storage), "{\"id\": 1}").is_err());
    }
}
