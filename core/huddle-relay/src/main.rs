//! huddle-relay: operator CLI for Huddle session state.
//!
//! Drives the same `huddle-core` session a client would, against the on-disk
//! store under `~/.huddle` (or `--root`).
//!
//! ## Subcommands
//!
//! - `replay`: Feeds JSON-lines events through a session, prints toasts as JSON lines
//! - `pins`: Lists or edits pinned chats
//! - `sort`: Orders a chat list with pinned chats first
//! - `theme`: Shows or changes the dark-mode preference

mod logging;
mod pins;
mod replay;
mod theme;

use clap::{Parser, Subcommand};
use huddle_core::StorageConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "huddle-relay")]
#[command(about = "Huddle session state relay")]
#[command(version)]
struct Cli {
    /// Storage root (defaults to ~/.huddle)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay inbound events (JSON lines) through a session
    Replay {
        /// User ID the session runs as
        #[arg(long, default_value = "me")]
        viewer: String,

        /// Event log to read (stdin when omitted)
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
    },

    /// Manage pinned chats
    Pins {
        #[command(subcommand)]
        action: pins::PinsAction,
    },

    /// Print a chat list (JSON array of {id, name}) with pinned chats first
    Sort {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
    },

    /// Show or change the dark-mode preference
    Theme {
        #[command(subcommand)]
        action: theme::ThemeAction,
    },
}

fn main() {
    let cli = Cli::parse();
    let storage = cli
        .root
        .map(StorageConfig::with_root)
        .unwrap_or_default();
    let _logging_guard = logging::init(&storage.logs_dir());

    let result = match cli.command {
        Commands::Replay { viewer, input } => replay::run(&storage, &viewer, input.as_deref()),
        Commands::Pins { action } => pins::run(&storage, action),
        Commands::Sort { input } => pins::sort(&storage, &input),
        Commands::Theme { action } => theme::run(&storage, action),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "huddle-relay failed");
        std::process::exit(1);
    }
}
