//! # huddle-core
//!
//! Client-side session state for Huddle: real-time event deduplication,
//! debounced toasts, pinned-chat ordering, the cross-tab theme preference and
//! the channel membership gate for post notifications.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Time is an injected [`Clock`];
//!   delayed work waits in a [`TimerQueue`] until the session ticks.
//! - **Not thread-safe**: Every mutation takes `&mut self`. Clients provide their
//!   own synchronization (`Mutex`) if they share a session across threads.
//! - **Graceful degradation**: Missing or corrupt stored values load as defaults,
//!   not errors. Only writes report failures.
//! - **Collaborators behind traits**: storage, channels, toasts and the theme
//!   class list are [`KeyValueStore`], [`ChannelStore`], [`ToastPresenter`] and
//!   [`ThemeApplier`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use huddle_core::{ChatSession, ClassList, FileStore, SessionSettings, StorageConfig, SystemClock};
//!
//! let storage = StorageConfig::default();
//! let store = Arc::new(FileStore::new(&storage.local_storage_file()));
//! let mut session = ChatSession::open("u-42", SessionSettings::default(), store,
//!     Box::new(SystemClock), ClassList::default());
//! session.handle_raw(line, &mut channels);
//! session.tick(&mut presenter);
//! ```

pub mod collation;
pub mod config;
pub mod error;
pub mod gate;
pub mod kv;
pub mod ledger;
pub mod pinned;
pub mod preference;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod toast;

pub use collation::{collation_key, CollationKey, CollationLocale};
pub use config::*;
pub use error::{HuddleError, Result};
pub use gate::{
    ChannelMember, ChannelMessage, ChannelStore, ChannelView, GateOutcome, MemoryChannelStore,
    MembershipGate, MessageKind, PostReference,
};
pub use kv::*;
pub use ledger::{Admission, EventLedger};
pub use pinned::{ChatSummary, Named, PinnedChats};
pub use preference::{ClassList, PreferenceSync, Theme, ThemeApplier};
pub use scheduler::{Clock, ManualClock, SystemClock, TimerId, TimerQueue, Timestamp};
pub use session::{ChatSession, EventOutcome};
pub use storage::{write_atomic, StorageConfig};
pub use toast::{
    ScheduleOutcome, Toast, ToastDebouncer, ToastLog, ToastPresenter, ToastRequest, ToastVariant,
};
