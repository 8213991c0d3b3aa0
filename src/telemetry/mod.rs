//! Per-queue statistics.
//!
//! Counters are plain atomics updated without a lock, so they may be observed
//! to tear slightly relative to the pop that triggered them, but each counter
//! is individually monotonic. Only operations that finalize an item (deliver
//! or drop-for-expiry) touch the stats; pushes never do.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Atomic counters for one queue.
#[derive(Debug, Default)]
pub struct QueueStats {
    processed: AtomicU64,
    dropped: AtomicU64,
    total_time_in_queue_ms: AtomicU64,
    max_time_in_queue_ms: AtomicU64,
}

impl QueueStats {
    /// Record a delivered item and its time in queue.
    pub fn process(&self, time_in_queue: Duration) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.update(time_in_queue);
    }

    /// Record an item dropped for expiry and its time in queue.
    pub fn drop_expired(&self, time_in_queue: Duration) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.update(time_in_queue);
    }

    fn update(&self, time_in_queue: Duration) {
        let ms = time_in_queue.num_milliseconds().max(0) as u64;
        self.total_time_in_queue_ms.fetch_add(ms, Ordering::Relaxed);
        self.max_time_in_queue_ms.fetch_max(ms, Ordering::Relaxed);
    }

    /// Consistent-enough copy of the counters, with the derived average.
    pub fn snapshot(&self) -> QueueStatsSnapshot {
        let processed = self.processed.load(Ordering::Relaxed);
        let dropped = self.dropped.load(Ordering::Relaxed);
        let total = self.total_time_in_queue_ms.load(Ordering::Relaxed);
        let finalized = processed + dropped;
        QueueStatsSnapshot {
            processed,
            dropped,
            total_time_in_queue_ms: total,
            max_time_in_queue_ms: self.max_time_in_queue_ms.load(Ordering::Relaxed),
            average_time_in_queue_ms: if finalized == 0 { 0 } else { total / finalized },
        }
    }
}

/// Wire shape of one queue's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatsSnapshot {
    pub processed: u64,
    pub dropped: u64,
    pub total_time_in_queue_ms: u64,
    pub max_time_in_queue_ms: u64,
    pub average_time_in_queue_ms: u64,
}

/// Stats registry, keyed by queue name. Removing a queue erases its
/// counters; historical stats of deleted queues are not retained.
#[derive(Debug, Default)]
pub struct Collector {
    stats: RwLock<HashMap<String, Arc<QueueStats>>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats slot for a queue, creating it when absent.
    pub fn add_queue(&self, name: &str) -> Arc<QueueStats> {
        let mut stats = self.write();
        Arc::clone(
            stats
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(QueueStats::default())),
        )
    }

    pub fn remove_queue(&self, name: &str) {
        self.write().remove(name);
    }

    /// Snapshot of every queue's counters.
    pub fn stats(&self) -> HashMap<String, QueueStatsSnapshot> {
        self.read()
            .iter()
            .map(|(name, stats)| (name.clone(), stats.snapshot()))
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<QueueStats>>> {
        self.stats.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<QueueStats>>> {
        self.stats.write().unwrap_or_else(|p| p.into_inner())
    }
}
