//! Debounced toast notifications.
//!
//! Requests are coalesced per key on the trailing edge: a new request for a key
//! replaces that key's pending timer, so only the last request in a burst fires.
//! Separately, once a key fires it enters a cool-down measured from the fire
//! time; requests for that key are dropped outright until it passes.
//!
//! ```text
//! request ──► cooling down? ──yes──► drop
//!                  │no
//!                  ▼
//!          cancel pending(key) ──► pending(key) = now + delay
//!                                          │ fire_due
//!                                          ▼
//!                       last_fired(key) = fire time, present toast,
//!                       clear last_fired(key) after toast duration
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SessionSettings;
use crate::error::Result;
use crate::scheduler::{TimerId, TimerQueue, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    #[default]
    Default,
    Destructive,
    Success,
}

impl ToastVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            ToastVariant::Default => "default",
            ToastVariant::Destructive => "destructive",
            ToastVariant::Success => "success",
        }
    }
}

/// What the presenter is asked to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub variant: ToastVariant,
    pub duration_ms: u64,
}

pub trait ToastPresenter {
    fn present(&mut self, toast: &Toast) -> Result<()>;
}

/// Presenter that keeps every toast it was handed, in order.
#[derive(Debug, Default, Clone)]
pub struct ToastLog {
    pub presented: Vec<Toast>,
}

impl ToastPresenter for ToastLog {
    fn present(&mut self, toast: &Toast) -> Result<()> {
        self.presented.push(toast.clone());
        Ok(())
    }
}

/// A toast request. Unset fields fall back to the debouncer's settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastRequest {
    message: String,
    description: Option<String>,
    variant: ToastVariant,
    duration_ms: Option<u64>,
    key: Option<String>,
    delay_ms: Option<u64>,
}

impl ToastRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            description: None,
            variant: ToastVariant::Default,
            duration_ms: None,
            key: None,
            delay_ms: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn variant(mut self, variant: ToastVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    /// The explicit key, or `"{message}-{variant}"`.
    pub fn resolved_key(&self) -> String {
        self.key
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.message, self.variant.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled,
    /// A pending timer for the same key was cancelled in favour of this one.
    Replaced,
    /// The key fired too recently; nothing was scheduled.
    CoolingDown,
}

#[derive(Debug)]
enum ToastTimer {
    Fire { key: String, toast: Toast },
    ClearFired { key: String, fired_at: Timestamp },
}

#[derive(Debug)]
pub struct ToastDebouncer {
    delay_ms: u64,
    cooldown_ms: u64,
    default_duration_ms: u64,
    timers: TimerQueue<ToastTimer>,
    pending: HashMap<String, TimerId>,
    last_fired: HashMap<String, Timestamp>,
}

impl ToastDebouncer {
    pub fn new(settings: &SessionSettings) -> Self {
        Self {
            delay_ms: settings.debounce_delay_ms,
            cooldown_ms: settings.cooldown_ms,
            default_duration_ms: settings.toast_duration_ms,
            timers: TimerQueue::new(),
            pending: HashMap::new(),
            last_fired: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, now: Timestamp, request: ToastRequest) -> ScheduleOutcome {
        let key = request.resolved_key();

        if let Some(fired_at) = self.last_fired.get(&key) {
            if now.saturating_sub(*fired_at) < self.cooldown_ms {
                debug!(key = %key, "Toast dropped during cool-down");
                return ScheduleOutcome::CoolingDown;
            }
        }

        let replaced = match self.pending.remove(&key) {
            Some(id) => self.timers.cancel(id).is_some(),
            None => false,
        };

        let delay = request.delay_ms.unwrap_or(self.delay_ms);
        let toast = Toast {
            title: request.message,
            description: request.description,
            variant: request.variant,
            duration_ms: request.duration_ms.unwrap_or(self.default_duration_ms),
        };
        let id = self.timers.schedule_after(
            now,
            delay,
            ToastTimer::Fire {
                key: key.clone(),
                toast,
            },
        );
        self.pending.insert(key, id);

        if replaced {
            ScheduleOutcome::Replaced
        } else {
            ScheduleOutcome::Scheduled
        }
    }

    /// Runs every timer due at or before `now`. Returns how many toasts fired.
    pub fn fire_due(&mut self, now: Timestamp, presenter: &mut dyn ToastPresenter) -> usize {
        let mut fired = 0;
        while let Some((_, due, timer)) = self.timers.pop_due(now) {
            match timer {
                ToastTimer::Fire { key, toast } => {
                    self.pending.remove(&key);
                    self.last_fired.insert(key.clone(), due);
                    if let Err(err) = presenter.present(&toast) {
                        warn!(key = %key, error = %err, "Toast presenter failed");
                    }
                    self.timers.schedule_after(
                        due,
                        toast.duration_ms,
                        ToastTimer::ClearFired { key, fired_at: due },
                    );
                    fired += 1;
                }
                ToastTimer::ClearFired { key, fired_at } => {
                    if self.last_fired.get(&key) == Some(&fired_at) {
                        self.last_fired.remove(&key);
                    }
                }
            }
        }
        fired
    }

    /// Cancels every pending toast and forgets every fire time.
    pub fn clear_all(&mut self) {
        self.timers.clear();
        self.pending.clear();
        self.last_fired.clear();
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn last_fired(&self, key: &str) -> Option<Timestamp> {
        self.last_fired.get(key).copied()
    }

    pub fn next_due(&self) -> Option<Timestamp> {
        self.timers.next_due()
    }
}
