//! Channel membership gate for "new post" notifications.
//!
//! A post notification becomes a system message in a channel only when:
//! 1. the channel is known locally,
//! 2. the viewer is one of its members,
//! 3. the (channel, post) pair has not been handled inside the ledger window.
//!
//! Failing 1 or 2 is not an error; the event simply does not apply to this
//! viewer. The gate filters and deduplicates. Writing the message is the
//! channel store's job.

use std::collections::BTreeMap;
use std::path::Path;

use fs_err as fs;
use huddle_protocol::NewPostPayload;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{HuddleError, Result};
use crate::ledger::{Admission, EventLedger};
use crate::scheduler::Timestamp;
use crate::storage::write_atomic;

pub const EXCERPT_CHARS: usize = 100;
pub const SYSTEM_SENDER_ID: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMember {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Read-only projection of a channel as the viewer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelView {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub members: Vec<ChannelMember>,
}

impl ChannelView {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.id == user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostReference {
    pub post_id: String,
    pub author_id: String,
    pub author_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    pub id: String,
    pub channel_id: String,
    pub sender_id: String,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: Timestamp,
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<PostReference>,
}

pub trait ChannelStore {
    fn channel(&self, channel_id: &str) -> Option<ChannelView>;
    fn add_message(&mut self, channel_id: &str, message: ChannelMessage) -> Result<()>;
}

/// In-memory channel store, optionally snapshotted to a JSON file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryChannelStore {
    channels: BTreeMap<String, ChannelView>,
    messages: BTreeMap<String, Vec<ChannelMessage>>,
}

impl MemoryChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_channel(&mut self, channel: ChannelView) {
        self.channels.insert(channel.id.clone(), channel);
    }

    pub fn messages(&self, channel_id: &str) -> &[ChannelMessage] {
        self.messages
            .get(channel_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Loads a snapshot. Missing or corrupt files load as an empty store.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to read channel snapshot");
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(store) => store,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Corrupt channel snapshot, starting empty");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_vec_pretty(self).map_err(|source| HuddleError::Json {
            context: "serializing channel snapshot".to_string(),
            source,
        })?;
        write_atomic(path, &content)
    }
}

impl ChannelStore for MemoryChannelStore {
    fn channel(&self, channel_id: &str) -> Option<ChannelView> {
        self.channels.get(channel_id).cloned()
    }

    fn add_message(&mut self, channel_id: &str, message: ChannelMessage) -> Result<()> {
        if !self.channels.contains_key(channel_id) {
            return Err(HuddleError::Delivery {
                channel_id: channel_id.to_string(),
                details: "channel not loaded".to_string(),
            });
        }
        self.messages
            .entry(channel_id.to_string())
            .or_default()
            .push(message);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Delivered,
    UnknownChannel,
    NotMember,
    Duplicate,
    DeliveryFailed,
}

pub fn post_dedup_key(channel_id: &str, post_id: &str) -> String {
    format!("new-post:{}:{}", channel_id, post_id)
}

/// First `max_chars` characters of `content`, with an ellipsis if cut.
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let trimmed = content.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", trimmed[..cut].trim_end()),
        None => trimmed.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct MembershipGate {
    viewer_id: String,
}

impl MembershipGate {
    pub fn new(viewer_id: impl Into<String>) -> Self {
        Self {
            viewer_id: viewer_id.into(),
        }
    }

    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    pub fn admit(
        &self,
        post: &NewPostPayload,
        ledger: &mut EventLedger,
        channels: &mut dyn ChannelStore,
        now: Timestamp,
    ) -> GateOutcome {
        let Some(channel) = channels.channel(&post.channel_id) else {
            debug!(channel = %post.channel_id, "Post for unknown channel dropped");
            return GateOutcome::UnknownChannel;
        };

        if !channel.has_member(&self.viewer_id) {
            debug!(channel = %post.channel_id, "Viewer not a channel member, post dropped");
            return GateOutcome::NotMember;
        }

        let key = post_dedup_key(&post.channel_id, &post.post_id);
        if ledger.admit(&key, now) == Admission::Duplicate {
            debug!(key = %key, "Duplicate post notification skipped");
            return GateOutcome::Duplicate;
        }

        let message = notification_message(post, now);
        match channels.add_message(&post.channel_id, message) {
            Ok(()) => GateOutcome::Delivered,
            Err(err) => {
                warn!(channel = %post.channel_id, error = %err, "Post notification not delivered");
                GateOutcome::DeliveryFailed
            }
        }
    }
}

fn notification_message(post: &NewPostPayload, now: Timestamp) -> ChannelMessage {
    let snippet = excerpt(&post.content, EXCERPT_CHARS);
    ChannelMessage {
        id: format!("post-notification-{}", post.post_id),
        channel_id: post.channel_id.clone(),
        sender_id: SYSTEM_SENDER_ID.to_string(),
        content: format!("{} shared a new post: \"{}\"", post.author.name, snippet),
        created_at: now,
        kind: MessageKind::System,
        reference: Some(PostReference {
            post_id: post.post_id.clone(),
            author_id: post.author.id.clone(),
            author_name: post.author.name.clone(),
            author_avatar: post.author.avatar.clone(),
            excerpt: snippet,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_protocol::Author;
    use tempfile::tempdir;

    fn member(id: &str) -> ChannelMember {
        ChannelMember {
            id: id.to_string(),
            name: id.to_uppercase(),
        }
    }

    fn store_with(channel_id: &str, members: &[&str]) -> MemoryChannelStore {
        let mut store = MemoryChannelStore::new();
        store.insert_channel(ChannelView {
            id: channel_id.to_string(),
            name: channel_id.to_string(),
            members: members.iter().map(|m| member(m)).collect(),
        });
        store
    }

    fn post(channel_id: &str, post_id: &str) -> NewPostPayload {
        NewPostPayload {
            channel_id: channel_id.to_string(),
            post_id: post_id.to_string(),
            author: Author {
                id: "u-author".to_string(),
                name: "Bao".to_string(),
                avatar: Some("/a/bao.png".to_string()),
            },
            content: "Release notes are up".to_string(),
        }
    }

    #[test]
    fn non_member_gets_nothing() {
        let mut store = store_with("C", &["someone-else"]);
        let mut ledger = EventLedger::new(300_000);
        let gate = MembershipGate::new("viewer");

        assert_eq!(
            gate.admit(&post("C", "p1"), &mut ledger, &mut store, 0),
            GateOutcome::NotMember
        );
        assert!(store.messages("C").is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn unknown_channel_gets_nothing() {
        let mut store = store_with("C", &["viewer"]);
        let mut ledger = EventLedger::new(300_000);
        let gate = MembershipGate::new("viewer");

        assert_eq!(
            gate.admit(&post("other", "p1"), &mut ledger, &mut store, 0),
            GateOutcome::UnknownChannel
        );
        assert!(store.messages("other").is_empty());
    }

    #[test]
    fn first_post_delivers_once_and_repeat_is_skipped() {
        let mut store = store_with("C", &["viewer", "u-author"]);
        let mut ledger = EventLedger::new(300_000);
        let gate = MembershipGate::new("viewer");

        assert_eq!(
            gate.admit(&post("C", "p1"), &mut ledger, &mut store, 10),
            GateOutcome::Delivered
        );
        assert_eq!(
            gate.admit(&post("C", "p1"), &mut ledger, &mut store, 20),
            GateOutcome::Duplicate
        );
        assert_eq!(store.messages("C").len(), 1);

        let message = &store.messages("C")[0];
        assert_eq!(message.kind, MessageKind::System);
        assert_eq!(message.sender_id, SYSTEM_SENDER_ID);
        assert_eq!(message.created_at, 10);
        let reference = message.reference.as_ref().unwrap();
        assert_eq!(reference.author_id, "u-author");
        assert_eq!(reference.author_avatar.as_deref(), Some("/a/bao.png"));
        assert_eq!(reference.excerpt, "Release notes are up");
    }

    #[test]
    fn same_post_in_another_channel_is_distinct() {
        let mut store = store_with("C", &["viewer"]);
        store.insert_channel(ChannelView {
            id: "D".to_string(),
            name: "D".to_string(),
            members: vec![member("viewer")],
        });
        let mut ledger = EventLedger::new(300_000);
        let gate = MembershipGate::new("viewer");

        gate.admit(&post("C", "p1"), &mut ledger, &mut store, 0);
        assert_eq!(
            gate.admit(&post("D", "p1"), &mut ledger, &mut store, 0),
            GateOutcome::Delivered
        );
    }

    struct Rejecting;

    impl ChannelStore for Rejecting {
        fn channel(&self, channel_id: &str) -> Option<ChannelView> {
            Some(ChannelView {
                id: channel_id.to_string(),
                name: String::new(),
                members: vec![member("viewer")],
            })
        }

        fn add_message(&mut self, channel_id: &str, _message: ChannelMessage) -> Result<()> {
            Err(HuddleError::Delivery {
                channel_id: channel_id.to_string(),
                details: "offline".to_string(),
            })
        }
    }

    #[test]
    fn delivery_failure_is_reported_not_raised() {
        let mut ledger = EventLedger::new(300_000);
        let gate = MembershipGate::new("viewer");
        assert_eq!(
            gate.admit(&post("C", "p1"), &mut ledger, &mut Rejecting, 0),
            GateOutcome::DeliveryFailed
        );
    }

    #[test]
    fn excerpt_cuts_on_char_boundary() {
        assert_eq!(excerpt("  short  ", 10), "short");
        assert_eq!(excerpt("Xin chào các bạn", 8), "Xin chào…");
        assert_eq!(excerpt("abc", 3), "abc");
    }

    #[test]
    fn snapshot_round_trips_and_tolerates_corruption() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("channels.json");

        let mut store = store_with("C", &["viewer"]);
        store
            .add_message("C", notification_message(&post("C", "p1"), 5))
            .unwrap();
        store.save(&path).unwrap();

        let loaded = MemoryChannelStore::load(&path);
        assert_eq!(loaded, store);

        std::fs::write(&path, "[").unwrap();
        assert_eq!(MemoryChannelStore::load(&path).channel_count(), 0);
    }
}
