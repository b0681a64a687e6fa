//! Event log replay.
//!
//! Reads one envelope per line and drives a session on a manual clock:
//!
//! ```text
//! line ──► parse_event ──► clock = max(clock, sent_at) or clock + 1 ms
//!                               │
//!                               ▼
//!                 tick (fire due toasts) ──► handle_event
//! EOF ──► step the clock through every remaining timer ──► save channels
//! ```
//!
//! Presented toasts go to stdout as JSON lines. The summary goes to stderr.

use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use fs_err as fs;
use huddle_core::{
    load_settings_with_storage, ChatSession, ClassList, Clock, EventOutcome, FileStore,
    HuddleError, ManualClock, MemoryChannelStore, StorageConfig, Timestamp, Toast,
    ToastPresenter,
};
use huddle_protocol::parse_event_str;
use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub posted: usize,
    pub notified: usize,
    pub duplicates: usize,
    pub dropped: usize,
    pub rejected: usize,
    pub toasts: usize,
}

impl std::fmt::Display for ReplaySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} events: {} posted, {} notified, {} duplicate, {} dropped, {} rejected; {} toasts",
            self.events,
            self.posted,
            self.notified,
            self.duplicates,
            self.dropped,
            self.rejected,
            self.toasts
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PresentedToast<'a> {
    at: Timestamp,
    #[serde(flatten)]
    toast: &'a Toast,
}

struct JsonLinePresenter<W: Write> {
    clock: ManualClock,
    out: W,
}

impl<W: Write> ToastPresenter for JsonLinePresenter<W> {
    fn present(&mut self, toast: &Toast) -> huddle_core::Result<()> {
        let line = PresentedToast {
            at: self.clock.now(),
            toast,
        };
        serde_json::to_writer(&mut self.out, &line)
            .map_err(|e| HuddleError::Presenter(e.to_string()))?;
        writeln!(self.out).map_err(|e| HuddleError::Presenter(e.to_string()))
    }
}

pub fn run(storage: &StorageConfig, viewer: &str, input: Option<&Path>) -> Result<(), String> {
    let stdout = io::stdout();
    let summary = match input {
        Some(path) => {
            let file = fs::File::open(path).map_err(|e| format!("Failed to open input: {}", e))?;
            replay(storage, viewer, BufReader::new(file), stdout.lock())?
        }
        None => replay(storage, viewer, io::stdin().lock(), stdout.lock())?,
    };
    eprintln!("{}", summary);
    Ok(())
}

pub fn replay<R: BufRead, W: Write>(
    storage: &StorageConfig,
    viewer: &str,
    reader: R,
    out: W,
) -> Result<ReplaySummary, String> {
    let settings = load_settings_with_storage(storage);
    let store = Arc::new(FileStore::new(&storage.local_storage_file()));
    let mut channels = MemoryChannelStore::load(&storage.channels_file());

    let clock = ManualClock::new(0);
    let mut session = ChatSession::open(
        viewer,
        settings,
        store,
        Box::new(clock.clone()),
        ClassList::default(),
    );
    let mut presenter = JsonLinePresenter {
        clock: clock.clone(),
        out,
    };
    let mut summary = ReplaySummary::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("Failed to read input: {}", e))?;
        if line.trim().is_empty() {
            continue;
        }
        summary.events += 1;

        let decoded = match parse_event_str(&line) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::warn!(line = index + 1, code = %err.code, error = %err.message, "Skipping event");
                summary.rejected += 1;
                continue;
            }
        };

        let at = decoded
            .sent_at
            .and_then(|sent_at| Timestamp::try_from(sent_at.timestamp_millis()).ok());
        match at {
            Some(at) if at > clock.now() => clock.set(at),
            Some(_) => {}
            None => {
                clock.advance(1);
            }
        }

        summary.toasts += session.tick(&mut presenter);
        match session.handle_event(&decoded.event, &mut channels) {
            EventOutcome::Posted(_) => summary.posted += 1,
            EventOutcome::Notified(_) => summary.notified += 1,
            EventOutcome::Duplicate => summary.duplicates += 1,
            EventOutcome::Gated(_) | EventOutcome::OwnEvent => summary.dropped += 1,
            EventOutcome::Rejected(_) => summary.rejected += 1,
        }
    }

    while let Some(due) = session.toasts().next_due() {
        clock.set(due.max(clock.now()));
        summary.toasts += session.tick(&mut presenter);
    }
    session.teardown();

    channels
        .save(&storage.channels_file())
        .map_err(|e| format!("Failed to save channels: {}", e))?;
    presenter
        .out
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;
    Ok(summary)
}
