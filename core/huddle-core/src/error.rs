//! Error types for huddle-core operations.
//!
//! Reads never surface these: missing or corrupt data degrades to defaults.
//! Only writes and collaborator calls report failures to the caller. Malformed
//! inbound events are an outcome, not an error.

use std::path::PathBuf;

/// All errors that can occur in huddle-core operations.
#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    // ─────────────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Storage write failed for key {key}: {details}")]
    Storage { key: String, details: String },

    #[error("Storage file has no parent directory: {0}")]
    InvalidStoragePath(PathBuf),

    // ─────────────────────────────────────────────────────────────────────
    // Collaborator Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Toast presenter unavailable: {0}")]
    Presenter(String),

    #[error("Message delivery to channel {channel_id} failed: {details}")]
    Delivery { channel_id: String, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results using HuddleError.
pub type Result<T> = std::result::Result<T, HuddleError>;

impl From<HuddleError> for String {
    fn from(err: HuddleError) -> String {
        err.to_string()
    }
}
