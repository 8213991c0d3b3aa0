//! Queued items and their factory.
//!
//! An item's `time_in_queue` is sampled exactly once, at dequeue. Afterward
//! every reader (including the expiry check) sees the sampled value, so an
//! item cannot "expire harder" while its stats are being recorded.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// One queued message.
#[derive(Debug, Clone)]
pub(crate) struct Item {
    uid: u64,
    value: String,
    enqueued_at: DateTime<Utc>,
    ttl: Duration,
    time_in_queue: Option<Duration>,
}

impl Item {
    fn new(uid: u64, value: String, ttl: Duration) -> Self {
        Self {
            uid,
            value,
            enqueued_at: Utc::now(),
            ttl,
            time_in_queue: None,
        }
    }

    pub(crate) fn uid(&self) -> u64 {
        self.uid
    }

    pub(crate) fn into_value(self) -> String {
        self.value
    }

    /// Sample the time spent in the queue. Idempotent: the first call pins
    /// the value, later calls return it unchanged.
    pub(crate) fn dequeue(&mut self) -> Duration {
        let tiq = self
            .time_in_queue
            .unwrap_or_else(|| Utc::now() - self.enqueued_at);
        self.time_in_queue = Some(tiq);
        tiq
    }

    /// A zero TTL never expires. Once `time_in_queue` has been sampled the
    /// check is against that fixed value, otherwise against the current age.
    pub(crate) fn expired(&self) -> bool {
        if self.ttl.is_zero() {
            return false;
        }
        let age = self
            .time_in_queue
            .unwrap_or_else(|| Utc::now() - self.enqueued_at);
        age >= self.ttl
    }

    #[cfg(test)]
    pub(crate) fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Produces items with unique uids and the queue's default TTL.
///
/// The factory tracks the uids of currently-live items; popping an item
/// releases its uid and clearing the queue releases all of them.
#[derive(Debug)]
pub(crate) struct ItemFactory {
    next_uid: u64,
    live: HashSet<u64>,
    default_ttl: Duration,
}

impl ItemFactory {
    pub(crate) fn new(default_ttl: Duration) -> Self {
        Self {
            next_uid: 0,
            live: HashSet::new(),
            default_ttl,
        }
    }

    /// Build an item; `ttl` of `None` means "use the queue default".
    pub(crate) fn new_item(&mut self, value: String, ttl: Option<Duration>) -> Item {
        self.next_uid += 1;
        let uid = self.next_uid;
        self.live.insert(uid);
        Item::new(uid, value, ttl.unwrap_or(self.default_ttl))
    }

    pub(crate) fn remove_uid(&mut self, uid: u64) {
        self.live.remove(&uid);
    }

    pub(crate) fn clear(&mut self) {
        self.live.clear();
    }

    pub(crate) fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    #[cfg(test)]
    pub(crate) fn live_count(&self) -> usize {
        self.live.len()
    }

    #[cfg(test)]
    pub(crate) fn is_live(&self, uid: u64) -> bool {
        self.live.contains(&uid)
    }
}
