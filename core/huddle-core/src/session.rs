//! One viewer's chat session.
//!
//! `ChatSession` owns an instance of every component and routes inbound events
//! through them:
//!
//! ```text
//! raw JSON ──► parse_event ──► handle_event
//!                                  │
//!        new-post ──► MembershipGate ──► ledger ──► channel store ──► toast
//!        new-direct-message ─────────────► ledger ────────────────────► toast
//!        incoming-call ──────────────────► ledger ────────────────────► toast
//! ```
//!
//! Toasts only leave the debouncer on [`ChatSession::tick`], which also
//! expires ledger keys. Pins and the theme preference are independent of the
//! event flow and are reached through their accessors.

use std::sync::Arc;

use huddle_protocol::{
    parse_event_str, DirectMessagePayload, ErrorInfo, IncomingCallPayload, InboundEvent,
    NewPostPayload,
};
use tracing::{debug, info, warn};

use crate::config::SessionSettings;
use crate::gate::{excerpt, ChannelStore, GateOutcome, MembershipGate, EXCERPT_CHARS};
use crate::kv::{KeyValueStore, StorageChange, DARK_MODE_KEY, PINNED_CHATS_KEY};
use crate::ledger::{Admission, EventLedger};
use crate::pinned::PinnedChats;
use crate::preference::{ClassList, PreferenceSync, ThemeApplier};
use crate::scheduler::{Clock, Timestamp};
use crate::toast::{ScheduleOutcome, ToastDebouncer, ToastPresenter, ToastRequest, ToastVariant};

/// What happened to one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A post notification reached its channel. Holds the toast outcome, or
    /// `None` when the viewer wrote the post and no toast was requested.
    Posted(Option<ScheduleOutcome>),
    /// A direct message or call was new; the toast went to the debouncer.
    Notified(ScheduleOutcome),
    /// The gate stopped a post before delivery.
    Gated(GateOutcome),
    Duplicate,
    /// The viewer sent the direct message or placed the call.
    OwnEvent,
    Rejected(ErrorInfo),
}

pub fn direct_message_key(payload: &DirectMessagePayload) -> String {
    format!(
        "direct-message:{}:{}",
        payload.conversation_id, payload.message_id
    )
}

pub fn call_key(payload: &IncomingCallPayload) -> String {
    format!("call:{}:{}", payload.room_id, payload.caller.id)
}

pub struct ChatSession<A: ThemeApplier = ClassList> {
    settings: SessionSettings,
    clock: Box<dyn Clock>,
    gate: MembershipGate,
    ledger: EventLedger,
    toasts: ToastDebouncer,
    pins: PinnedChats,
    preference: PreferenceSync<A>,
}

impl<A: ThemeApplier> ChatSession<A> {
    /// Loads pins and mounts the theme preference from `storage`.
    pub fn open(
        viewer_id: impl Into<String>,
        settings: SessionSettings,
        storage: Arc<dyn KeyValueStore>,
        clock: Box<dyn Clock>,
        applier: A,
    ) -> Self {
        let gate = MembershipGate::new(viewer_id);
        let pins = PinnedChats::load(Arc::clone(&storage), settings.collation);
        let preference = PreferenceSync::mount(storage, applier, settings.default_dark_mode);
        info!(
            viewer = %gate.viewer_id(),
            pinned = pins.len(),
            dark_mode = preference.is_dark_mode(),
            "Session opened"
        );
        Self {
            ledger: EventLedger::new(settings.ledger_retention_ms),
            toasts: ToastDebouncer::new(&settings),
            settings,
            clock,
            gate,
            pins,
            preference,
        }
    }

    pub fn viewer_id(&self) -> &str {
        self.gate.viewer_id()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Decodes and handles one JSON event. Malformed input is logged and rejected.
    pub fn handle_raw(&mut self, raw: &str, channels: &mut dyn ChannelStore) -> EventOutcome {
        match parse_event_str(raw) {
            Ok(decoded) => self.handle_event(&decoded.event, channels),
            Err(err) => {
                warn!(code = %err.code, error = %err.message, "Rejected inbound event");
                EventOutcome::Rejected(err)
            }
        }
    }

    pub fn handle_event(
        &mut self,
        event: &InboundEvent,
        channels: &mut dyn ChannelStore,
    ) -> EventOutcome {
        if let Err(err) = event.validate() {
            warn!(event = event.name().as_str(), error = %err, "Rejected inbound event");
            return EventOutcome::Rejected(err);
        }

        let now = self.clock.now();
        match event {
            InboundEvent::NewPost(post) => self.handle_post(post, channels, now),
            InboundEvent::NewDirectMessage(message) => self.handle_direct_message(message, now),
            InboundEvent::IncomingCall(call) => self.handle_call(call, now),
        }
    }

    fn handle_post(
        &mut self,
        post: &NewPostPayload,
        channels: &mut dyn ChannelStore,
        now: Timestamp,
    ) -> EventOutcome {
        match self.gate.admit(post, &mut self.ledger, channels, now) {
            GateOutcome::Delivered => {}
            GateOutcome::Duplicate => return EventOutcome::Duplicate,
            other => return EventOutcome::Gated(other),
        }

        if post.author.id == self.viewer_id() {
            debug!(post = %post.post_id, "Own post delivered without toast");
            return EventOutcome::Posted(None);
        }

        let channel_name = channels
            .channel(&post.channel_id)
            .map(|channel| channel.name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| post.channel_id.clone());
        let request = ToastRequest::new(format!("New post in {}", channel_name))
            .description(format!("{} shared a new post", post.author.name))
            .key(format!("new-post:{}", post.channel_id));
        EventOutcome::Posted(Some(self.toasts.schedule(now, request)))
    }

    fn handle_direct_message(
        &mut self,
        message: &DirectMessagePayload,
        now: Timestamp,
    ) -> EventOutcome {
        if message.sender.id == self.viewer_id() {
            return EventOutcome::OwnEvent;
        }

        let key = direct_message_key(message);
        if self.ledger.admit(&key, now) == Admission::Duplicate {
            debug!(key = %key, "Duplicate direct message skipped");
            return EventOutcome::Duplicate;
        }

        let request = ToastRequest::new(format!("New message from {}", message.sender.name))
            .description(excerpt(&message.content, EXCERPT_CHARS))
            .key(format!("direct-message:{}", message.conversation_id));
        EventOutcome::Notified(self.toasts.schedule(now, request))
    }

    fn handle_call(&mut self, call: &IncomingCallPayload, now: Timestamp) -> EventOutcome {
        if call.caller.id == self.viewer_id() {
            return EventOutcome::OwnEvent;
        }

        let key = call_key(call);
        if self.ledger.admit(&key, now) == Admission::Duplicate {
            debug!(key = %key, "Duplicate call notification skipped");
            return EventOutcome::Duplicate;
        }

        let kind = if call.video { "video call" } else { "call" };
        let request = ToastRequest::new(format!("Incoming {} from {}", kind, call.caller.name))
            .variant(ToastVariant::Success)
            .key(format!("call:{}", call.room_id));
        EventOutcome::Notified(self.toasts.schedule(now, request))
    }

    /// Fires due toasts and expires ledger keys. Returns how many toasts fired.
    pub fn tick(&mut self, presenter: &mut dyn ToastPresenter) -> usize {
        let now = self.clock.now();
        let fired = self.toasts.fire_due(now, presenter);
        let expired = self.ledger.expire_due(now);
        if expired > 0 {
            debug!(expired, "Expired processed-event keys");
        }
        fired
    }

    /// Routes a change made by another tab. Returns true if session state moved.
    pub fn on_storage_change(&mut self, change: &StorageChange) -> bool {
        match change.key.as_str() {
            DARK_MODE_KEY => self.preference.on_storage_change(change),
            PINNED_CHATS_KEY => {
                self.pins.reload();
                true
            }
            _ => false,
        }
    }

    pub fn on_preference_event(&mut self) -> bool {
        self.preference.on_preference_event()
    }

    pub fn poll_preferences(&mut self) -> bool {
        self.preference.poll()
    }

    /// Cancels every pending toast. Call when the session's view unmounts.
    pub fn teardown(&mut self) {
        self.toasts.clear_all();
        info!(viewer = %self.viewer_id(), "Session torn down");
    }

    pub fn pins(&self) -> &PinnedChats {
        &self.pins
    }

    pub fn pins_mut(&mut self) -> &mut PinnedChats {
        &mut self.pins
    }

    pub fn preference(&self) -> &PreferenceSync<A> {
        &self.preference
    }

    pub fn preference_mut(&mut self) -> &mut PreferenceSync<A> {
        &mut self.preference
    }

    pub fn ledger(&self) -> &EventLedger {
        &self.ledger
    }

    pub fn toasts(&self) -> &ToastDebouncer {
        &self.toasts
    }
}
