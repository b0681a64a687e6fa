//! Inbound real-time event types and validation for Huddle.
//!
//! The transport delivers named events with JSON payloads. This crate is shared
//! by the session core and the relay CLI so both decode the same schemas.
//! Decoding is two-step: the envelope is read first, then the payload is read
//! into the struct for that event name. Unknown names and unknown fields are
//! rejected instead of being trusted at the use site.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_ID_LEN: usize = 128;
pub const MAX_CONTENT_BYTES: usize = 64 * 1024;

static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.:\-]+$").expect("id pattern compiles"));

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorInfo {}

/// Event names accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    NewPost,
    NewDirectMessage,
    IncomingCall,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::NewPost => "new-post",
            EventName::NewDirectMessage => "new-direct-message",
            EventName::IncomingCall => "incoming-call",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "new-post" => Some(EventName::NewPost),
            "new-direct-message" => Some(EventName::NewDirectMessage),
            "incoming-call" => Some(EventName::IncomingCall),
            _ => None,
        }
    }
}

/// Identity of a user as carried inside event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Author {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewPostPayload {
    pub channel_id: String,
    pub post_id: String,
    pub author: Author,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectMessagePayload {
    pub conversation_id: String,
    pub message_id: String,
    pub sender: Author,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IncomingCallPayload {
    pub room_id: String,
    pub caller: Author,
    #[serde(default)]
    pub video: bool,
}

/// A decoded inbound event, discriminated by event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    NewPost(NewPostPayload),
    NewDirectMessage(DirectMessagePayload),
    IncomingCall(IncomingCallPayload),
}

impl InboundEvent {
    pub fn name(&self) -> EventName {
        match self {
            InboundEvent::NewPost(_) => EventName::NewPost,
            InboundEvent::NewDirectMessage(_) => EventName::NewDirectMessage,
            InboundEvent::IncomingCall(_) => EventName::IncomingCall,
        }
    }

    pub fn validate(&self) -> Result<(), ErrorInfo> {
        match self {
            InboundEvent::NewPost(post) => {
                require_id(&post.channel_id, "channel_id")?;
                require_id(&post.post_id, "post_id")?;
                require_author(&post.author, "author")?;
                require_content(&post.content)?;
            }
            InboundEvent::NewDirectMessage(message) => {
                require_id(&message.conversation_id, "conversation_id")?;
                require_id(&message.message_id, "message_id")?;
                require_author(&message.sender, "sender")?;
                require_content(&message.content)?;
            }
            InboundEvent::IncomingCall(call) => {
                require_id(&call.room_id, "room_id")?;
                require_author(&call.caller, "caller")?;
            }
        }
        Ok(())
    }

    /// Re-encodes the event as a wire envelope.
    pub fn to_envelope(&self) -> EventEnvelope {
        let payload = match self {
            InboundEvent::NewPost(p) => serde_json::to_value(p),
            InboundEvent::NewDirectMessage(p) => serde_json::to_value(p),
            InboundEvent::IncomingCall(p) => serde_json::to_value(p),
        };
        EventEnvelope {
            event: self.name().as_str().to_string(),
            event_id: None,
            sent_at: None,
            payload: payload.unwrap_or(Value::Null),
        }
    }
}

/// The raw wire envelope. The payload stays untyped until the event name is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventEnvelope {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<String>,
    pub payload: Value,
}

/// An envelope whose payload has been decoded and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub event_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub event: InboundEvent,
}

impl EventEnvelope {
    pub fn decode(self) -> Result<DecodedEvent, ErrorInfo> {
        let name = EventName::parse(&self.event).ok_or_else(|| {
            ErrorInfo::new("unknown_event", format!("unknown event name: {}", self.event))
        })?;

        if let Some(event_id) = &self.event_id {
            require_id(event_id, "event_id")?;
        }

        let sent_at = match &self.sent_at {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|_| ErrorInfo::new("invalid_timestamp", "sent_at must be RFC3339"))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        let event = match name {
            EventName::NewPost => InboundEvent::NewPost(decode_payload(name, self.payload)?),
            EventName::NewDirectMessage => {
                InboundEvent::NewDirectMessage(decode_payload(name, self.payload)?)
            }
            EventName::IncomingCall => {
                InboundEvent::IncomingCall(decode_payload(name, self.payload)?)
            }
        };
        event.validate()?;

        Ok(DecodedEvent {
            event_id: self.event_id,
            sent_at,
            event,
        })
    }
}

pub fn parse_event(value: Value) -> Result<DecodedEvent, ErrorInfo> {
    let envelope: EventEnvelope = serde_json::from_value(value).map_err(|err| {
        ErrorInfo::new("invalid_envelope", format!("event envelope is invalid: {}", err))
    })?;
    envelope.decode()
}

pub fn parse_event_str(raw: &str) -> Result<DecodedEvent, ErrorInfo> {
    let value: Value = serde_json::from_str(raw).map_err(|err| {
        ErrorInfo::new("invalid_json", format!("event is not valid JSON: {}", err))
    })?;
    parse_event(value)
}

fn decode_payload<T: serde::de::DeserializeOwned>(
    name: EventName,
    payload: Value,
) -> Result<T, ErrorInfo> {
    serde_json::from_value(payload).map_err(|err| {
        ErrorInfo::new(
            "invalid_payload",
            format!("{} payload is invalid: {}", name.as_str(), err),
        )
    })
}

fn require_id(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if value.trim().is_empty() {
        return Err(ErrorInfo::new(
            "missing_field",
            format!("{} is required", field),
        ));
    }
    if value.len() > MAX_ID_LEN {
        return Err(ErrorInfo::new(
            "invalid_id",
            format!("{} must be {} characters or fewer", field, MAX_ID_LEN),
        ));
    }
    if !ID_PATTERN.is_match(value) {
        return Err(ErrorInfo::new(
            "invalid_id",
            format!("{} contains unsupported characters", field),
        ));
    }
    Ok(())
}

fn require_author(author: &Author, field: &str) -> Result<(), ErrorInfo> {
    require_id(&author.id, &format!("{}.id", field))?;
    if author.name.trim().is_empty() {
        return Err(ErrorInfo::new(
            "missing_field",
            format!("{}.name is required", field),
        ));
    }
    Ok(())
}

fn require_content(content: &str) -> Result<(), ErrorInfo> {
    if content.len() > MAX_CONTENT_BYTES {
        return Err(ErrorInfo::new(
            "content_too_large",
            format!("content must be {} bytes or fewer", MAX_CONTENT_BYTES),
        ));
    }
    Ok(())
}
