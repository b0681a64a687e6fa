//! Processed-event ledger.
//!
//! The transport delivers at least once, so the same event can arrive several
//! times. The ledger remembers each handled key for a fixed retention window and
//! rejects repeats inside it. Every key expires on its own schedule; there is no
//! sliding global window.
//!
//! Expiry is enforced twice: lazily on lookup (an elapsed key counts as fresh)
//! and eagerly by [`EventLedger::expire_due`] so memory does not grow between
//! lookups.

use std::collections::HashMap;

use crate::scheduler::{TimerQueue, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Fresh,
    Duplicate,
}

#[derive(Debug)]
pub struct EventLedger {
    retention_ms: u64,
    expires_at: HashMap<String, Timestamp>,
    expiry: TimerQueue<String>,
}

impl EventLedger {
    pub fn new(retention_ms: u64) -> Self {
        Self {
            retention_ms,
            expires_at: HashMap::new(),
            expiry: TimerQueue::new(),
        }
    }

    /// Checks and records `key` in one step.
    pub fn admit(&mut self, key: &str, now: Timestamp) -> Admission {
        if let Some(expires_at) = self.expires_at.get(key) {
            if now < *expires_at {
                return Admission::Duplicate;
            }
        }

        let expires_at = now.saturating_add(self.retention_ms);
        self.expires_at.insert(key.to_string(), expires_at);
        self.expiry.schedule_at(expires_at, key.to_string());
        Admission::Fresh
    }

    pub fn should_process(&mut self, key: &str, now: Timestamp) -> bool {
        self.admit(key, now) == Admission::Fresh
    }

    /// Drops keys whose retention elapsed. Returns how many were removed.
    pub fn expire_due(&mut self, now: Timestamp) -> usize {
        let mut removed = 0;
        while let Some((_, due, key)) = self.expiry.pop_due(now) {
            // A key re-admitted after lazy expiry carries a later deadline.
            if self.expires_at.get(&key) == Some(&due) {
                self.expires_at.remove(&key);
                removed += 1;
            }
        }
        removed
    }

    pub fn contains(&self, key: &str, now: Timestamp) -> bool {
        self.expires_at
            .get(key)
            .map(|expires_at| now < *expires_at)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.expires_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expires_at.is_empty()
    }

    pub fn clear(&mut self) {
        self.expires_at.clear();
        self.expiry.clear();
    }

    pub fn retention_ms(&self) -> u64 {
        self.retention_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_LEDGER_RETENTION_MS;

    #[test]
    fn first_sighting_is_fresh_then_duplicate() {
        let mut ledger = EventLedger::new(DEFAULT_LEDGER_RETENTION_MS);
        assert!(ledger.should_process("A", 0));
        assert!(!ledger.should_process("A", 1));
        assert!(!ledger.should_process("A", DEFAULT_LEDGER_RETENTION_MS - 1));
    }

    #[test]
    fn key_is_fresh_again_after_retention() {
        let mut ledger = EventLedger::new(DEFAULT_LEDGER_RETENTION_MS);
        assert!(ledger.should_process("A", 0));
        assert_eq!(ledger.expire_due(DEFAULT_LEDGER_RETENTION_MS), 1);
        assert!(ledger.is_empty());
        assert!(ledger.should_process("A", DEFAULT_LEDGER_RETENTION_MS));
    }

    #[test]
    fn lazy_expiry_without_tick() {
        let mut ledger = EventLedger::new(1_000);
        assert_eq!(ledger.admit("A", 0), Admission::Fresh);
        assert_eq!(ledger.admit("A", 1_000), Admission::Fresh);
        assert_eq!(ledger.admit("A", 1_500), Admission::Duplicate);
    }

    #[test]
    fn stale_expiry_does_not_remove_readmitted_key() {
        let mut ledger = EventLedger::new(1_000);
        ledger.admit("A", 0);
        ledger.admit("A", 1_200);
        // The first deadline (1_000) fires but the key now lives until 2_200.
        assert_eq!(ledger.expire_due(1_500), 0);
        assert!(ledger.contains("A", 1_500));
        assert_eq!(ledger.expire_due(2_200), 1);
        assert!(!ledger.contains("A", 2_200));
    }

    #[test]
    fn keys_expire_independently() {
        let mut ledger = EventLedger::new(1_000);
        ledger.admit("A", 0);
        ledger.admit("B", 600);
        assert_eq!(ledger.expire_due(1_000), 1);
        assert!(!ledger.contains("A", 1_000));
        assert!(ledger.contains("B", 1_000));
        assert_eq!(ledger.admit("B", 1_000), Admission::Duplicate);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut ledger = EventLedger::new(1_000);
        ledger.admit("A", 0);
        ledger.clear();
        assert_eq!(ledger.len(), 0);
        assert!(ledger.should_process("A", 1));
    }
}
