//! Clock and timer queue shared by the time-based components.
//!
//! Nothing in the core sleeps or spawns. Components park delayed work in a
//! [`TimerQueue`] and the session drains due entries on each tick, so tests can
//! drive time with a [`ManualClock`] instead of waiting on the wall clock.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn set(&self, at: Timestamp) {
        self.now.store(at, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: u64) -> Timestamp {
        self.now.fetch_add(millis, Ordering::SeqCst) + millis
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Cancellable delayed entries ordered by due time, then by insertion.
#[derive(Debug)]
pub struct TimerQueue<T> {
    next_seq: u64,
    entries: BTreeMap<(Timestamp, u64), T>,
    due_by_id: HashMap<TimerId, Timestamp>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            next_seq: 0,
            entries: BTreeMap::new(),
            due_by_id: HashMap::new(),
        }
    }

    pub fn schedule_at(&mut self, due: Timestamp, payload: T) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = TimerId(seq);
        self.entries.insert((due, seq), payload);
        self.due_by_id.insert(id, due);
        id
    }

    pub fn schedule_after(&mut self, now: Timestamp, delay_ms: u64, payload: T) -> TimerId {
        self.schedule_at(now.saturating_add(delay_ms), payload)
    }

    /// Removes a pending entry. Returns its payload if it had not fired yet.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let due = self.due_by_id.remove(&id)?;
        self.entries.remove(&(due, id.0))
    }

    /// Pops the earliest entry due at or before `now`.
    pub fn pop_due(&mut self, now: Timestamp) -> Option<(TimerId, Timestamp, T)> {
        let (&(due, seq), _) = self.entries.iter().next()?;
        if due > now {
            return None;
        }
        let payload = self.entries.remove(&(due, seq))?;
        let id = TimerId(seq);
        self.due_by_id.remove(&id);
        Some((id, due, payload))
    }

    pub fn next_due(&self) -> Option<Timestamp> {
        self.entries.keys().next().map(|(due, _)| *due)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.due_by_id.contains_key(&id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.due_by_id.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_reads_wall_time() {
        let before = Utc::now().timestamp_millis() as u64;
        let now = SystemClock.now();
        let after = Utc::now().timestamp_millis() as u64;
        assert!(before <= now && now <= after);
    }

    #[test]
    fn pops_in_due_order_then_insertion_order() {
        let mut queue = TimerQueue::new();
        queue.schedule_at(200, "late");
        queue.schedule_at(100, "first");
        queue.schedule_at(100, "second");

        assert_eq!(queue.pop_due(150).map(|(_, _, p)| p), Some("first"));
        assert_eq!(queue.pop_due(150).map(|(_, _, p)| p), Some("second"));
        assert!(queue.pop_due(150).is_none());
        assert_eq!(queue.pop_due(200).map(|(_, due, p)| (due, p)), Some((200, "late")));
        assert!(queue.is_empty());
    }

    #[test]
    fn cancel_removes_pending_entry() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule_after(1_000, 500, 7);
        assert!(queue.is_pending(id));
        assert_eq!(queue.cancel(id), Some(7));
        assert!(!queue.is_pending(id));
        assert_eq!(queue.cancel(id), None);
        assert!(queue.pop_due(u64::MAX).is_none());
    }

    #[test]
    fn cancel_after_fire_is_noop() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule_at(10, ());
        assert!(queue.pop_due(10).is_some());
        assert_eq!(queue.cancel(id), None);
    }

    #[test]
    fn schedule_after_saturates() {
        let mut queue = TimerQueue::new();
        queue.schedule_after(u64::MAX - 1, 10, ());
        assert_eq!(queue.next_due(), Some(u64::MAX));
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();
        assert_eq!(clock.advance(250), 1_250);
        assert_eq!(other.now(), 1_250);
        other.set(5);
        assert_eq!(clock.now(), 5);
    }
}
