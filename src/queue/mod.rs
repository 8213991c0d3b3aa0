//! Bounded FIFO queue of TTL-bearing items.
//!
//! Every public operation takes the queue's mutex, so producers and
//! consumers interleave freely. Push and pop are O(1) amortized; the backing
//! storage shrinks on pop when occupancy drops below half of capacity, but
//! never below the configured minimum length.
//!
//! Expired items are dropped (not delivered) during the pop scan and counted
//! against the queue's statistics; pushes never touch the statistics.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Duration;

use crate::config::QueueConfig;
use crate::telemetry::QueueStats;
use crate::types::{Error, Result};

mod item;

use item::{Item, ItemFactory};

struct Inner {
    items: VecDeque<Item>,
    factory: ItemFactory,
}

/// Named, bounded, in-memory FIFO with a per-item TTL.
pub struct Queue {
    min_len: usize,
    max_len: usize,
    // Reserved for byte-cap enforcement; accepted and stored, not enforced.
    max_size_bytes: usize,
    inner: Mutex<Inner>,
    stats: Arc<QueueStats>,
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("min_len", &self.min_len)
            .field("max_len", &self.max_len)
            .field("max_size_bytes", &self.max_size_bytes)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl Queue {
    /// Build a queue from resolved options. `config.ttl` is seconds, zero
    /// meaning items never expire. A non-positive minimum length is clamped
    /// to 1.
    pub fn new(config: &QueueConfig, stats: Arc<QueueStats>) -> Self {
        let min_len = config.min_length.max(1) as usize;
        Self {
            min_len,
            max_len: config.max_length.max(0) as usize,
            max_size_bytes: config.max_size_bytes.max(0) as usize,
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(min_len),
                factory: ItemFactory::new(Duration::seconds(config.ttl.max(0))),
            }),
            stats,
        }
    }

    /// Append a value with the queue's default TTL. Returns the item uid.
    pub fn push(&self, value: impl Into<String>) -> Result<u64> {
        self.push_with_ttl(value, None)
    }

    /// Append a value with an explicit TTL. `None` means "use the queue
    /// default"; a zero duration means "never expires".
    pub fn push_with_ttl(&self, value: impl Into<String>, ttl: Option<Duration>) -> Result<u64> {
        let mut inner = self.lock();
        if inner.items.len() == self.max_len {
            return Err(Error::QueueFull);
        }
        let item = inner.factory.new_item(value.into(), ttl);
        let uid = item.uid();
        inner.items.push_back(item);
        Ok(uid)
    }

    /// Append a batch atomically: either every value is inserted, in order,
    /// or none is. A batch that would reach the maximum length is rejected.
    pub fn push_batch(&self, values: Vec<String>) -> Result<Vec<u64>> {
        let mut inner = self.lock();
        if inner.items.len() + values.len() >= self.max_len {
            return Err(Error::QueueFull);
        }
        let mut uids = Vec::with_capacity(values.len());
        for value in values {
            let item = inner.factory.new_item(value, None);
            uids.push(item.uid());
            inner.items.push_back(item);
        }
        Ok(uids)
    }

    /// Remove items from the head until a live one is found and return its
    /// value. Expired items encountered on the way are counted as dropped;
    /// the delivered item is counted as processed.
    pub fn pop(&self) -> Result<String> {
        let mut inner = self.lock();
        loop {
            let Some(mut item) = inner.items.pop_front() else {
                return Err(Error::QueueEmpty);
            };
            inner.factory.remove_uid(item.uid());
            self.maybe_shrink(&mut inner);

            let time_in_queue = item.dequeue();
            if item.expired() {
                self.stats.drop_expired(time_in_queue);
                continue;
            }
            self.stats.process(time_in_queue);
            return Ok(item.into_value());
        }
    }

    /// Pop everything in FIFO order, applying the usual expiry accounting,
    /// and return the surviving values.
    pub fn drain(&self) -> Vec<String> {
        let mut inner = self.lock();
        let mut values = Vec::with_capacity(inner.items.len());
        while let Some(mut item) = inner.items.pop_front() {
            let time_in_queue = item.dequeue();
            if item.expired() {
                self.stats.drop_expired(time_in_queue);
            } else {
                self.stats.process(time_in_queue);
                values.push(item.into_value());
            }
        }
        inner.factory.clear();
        inner.items = VecDeque::with_capacity(self.min_len);
        values
    }

    /// Current item count.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The queue's default TTL for new items.
    pub fn default_ttl(&self) -> Duration {
        self.lock().factory.default_ttl()
    }

    /// Shrink the backing storage when it is less than half full, down to
    /// twice the current length but never below the minimum length.
    fn maybe_shrink(&self, inner: &mut Inner) {
        let cap = inner.items.capacity();
        if cap > self.min_len && inner.items.len() < cap / 2 {
            let target = (inner.items.len() * 2).max(self.min_len);
            let mut next = VecDeque::with_capacity(target);
            next.extend(inner.items.drain(..));
            inner.items = next;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.lock().items.capacity()
    }
}
