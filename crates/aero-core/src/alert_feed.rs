//! Capacity-bounded, most-recent-first alert log.
//!
//! Insertion is always at the head. Pushing past capacity evicts the tail
//! (oldest) entry. INFO alerts carry a deadline after which
//! [`AlertFeed::evict_expired`] drops them; the dashboard also schedules a
//! timer per INFO alert that calls [`AlertFeed::remove`].

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::types::{Alert, AlertId};

/// Maximum number of alerts kept in the feed.
pub const ALERT_FEED_CAPACITY: usize = 10;

/// Lifetime of an INFO alert.
pub const INFO_ALERT_TTL: Duration = Duration::from_secs(5);

struct Entry {
    alert: Alert,
    expires_at: Option<Instant>,
}

/// Outcome of a single [`AlertFeed::push`].
#[derive(Debug, Clone, PartialEq)]
pub struct PushOutcome {
    pub id: AlertId,
    /// Deadline for INFO alerts, `None` otherwise.
    pub expires_at: Option<Instant>,
    /// Alert dropped from the tail to stay within capacity.
    pub evicted: Option<AlertId>,
}

pub struct AlertFeed {
    entries: VecDeque<Entry>,
    capacity: usize,
    ttl: Duration,
}

impl Default for AlertFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertFeed {
    pub fn new() -> Self {
        Self::with_ttl(INFO_ALERT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: VecDeque::with_capacity(ALERT_FEED_CAPACITY + 1),
            capacity: ALERT_FEED_CAPACITY,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert at the head, evicting the oldest alert if over capacity.
    pub fn push(&mut self, alert: Alert) -> PushOutcome {
        self.push_at(alert, Instant::now())
    }

    pub fn push_at(&mut self, alert: Alert, now: Instant) -> PushOutcome {
        let id = alert.id;
        let expires_at = alert.level.expires().then(|| now + self.ttl);

        self.entries.push_front(Entry { alert, expires_at });

        let evicted = if self.entries.len() > self.capacity {
            self.entries.pop_back().map(|e| e.alert.id)
        } else {
            None
        };

        tracing::debug!(
            %id,
            len = self.entries.len(),
            evicted = ?evicted,
            "alert pushed"
        );

        PushOutcome {
            id,
            expires_at,
            evicted,
        }
    }

    /// Remove a specific alert. Removing an absent alert is a no-op.
    pub fn remove(&mut self, id: AlertId) -> bool {
        match self.entries.iter().position(|e| e.alert.id == id) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Drop every alert whose deadline is at or before `now`.
    /// Returns the ids that were removed.
    pub fn evict_expired(&mut self, now: Instant) -> Vec<AlertId> {
        let mut removed = Vec::new();
        self.entries.retain(|e| match e.expires_at {
            Some(deadline) if deadline <= now => {
                removed.push(e.alert.id);
                false
            }
            _ => true,
        });
        removed
    }

    /// Alerts ordered most-recent-first.
    pub fn all(&self) -> Vec<Alert> {
        self.entries.iter().map(|e| e.alert.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.entries.iter().map(|e| &e.alert)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: AlertId) -> bool {
        self.entries.iter().any(|e| e.alert.id == id)
    }
}
