//! The message broker: registry of named queues.
//!
//! The broker owns its queues, a per-queue buffer of payloads that failed to
//! enqueue (a failure journal, appended to and never drained), and the stats
//! collector. Queue create/delete is mirrored into the running configuration
//! so the persisted topology always matches the live one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::Duration;

use crate::config::{ConfigState, QueueConfig};
use crate::queue::Queue;
use crate::telemetry::{Collector, QueueStatsSnapshot};
use crate::types::{Error, Result};

mod options;

use options::resolve_options;

/// Names a queue may not take.
const RESERVED_QUEUE_NAMES: &[&str] = &["broadcast"];

fn normalize_queue_name(name: &str) -> String {
    name.trim_matches('/').to_ascii_lowercase()
}

/// Lowercase ASCII word/dash characters only, non-empty after stripping
/// surrounding slashes, and not a reserved name.
pub fn is_valid_queue_name(name: &str) -> bool {
    let name = normalize_queue_name(name);
    if name.trim().is_empty() {
        return false;
    }
    if RESERVED_QUEUE_NAMES.contains(&name.as_str()) {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Registry of named queues with publish/consume/broadcast operations.
#[derive(Debug)]
pub struct Broker {
    queues: RwLock<HashMap<String, Queue>>,
    unsent: Mutex<HashMap<String, Vec<String>>>,
    collector: Collector,
    state: Arc<ConfigState>,
}

impl Broker {
    pub fn new(state: Arc<ConfigState>) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            unsent: Mutex::new(HashMap::new()),
            collector: Collector::new(),
            state,
        }
    }

    /// Create a queue, resolving each option against the broker defaults,
    /// and mirror the resolved configuration into the running config.
    pub fn add_queue(&self, name: &str, options: QueueConfig) -> Result<()> {
        let mut queues = self.write_queues();
        if queues.contains_key(name) {
            return Err(Error::already_exists(format!("queue `{}`", name)));
        }

        let resolved = resolve_options(&options, &self.state.broker_defaults());
        let stats = self.collector.add_queue(name);
        queues.insert(name.to_string(), Queue::new(&resolved, stats));
        drop(queues);

        self.lock_unsent().entry(name.to_string()).or_default();
        self.state.create_queue(name, resolved);
        tracing::info!(
            queue = name,
            min_length = resolved.min_length,
            max_length = resolved.max_length,
            ttl_seconds = resolved.ttl,
            "created queue"
        );
        Ok(())
    }

    /// Create a queue with every option defaulted.
    pub fn add_default_queue(&self, name: &str) -> Result<()> {
        let defaults = self.state.broker_defaults();
        self.add_queue(
            name,
            QueueConfig {
                min_length: defaults.min_len,
                max_length: defaults.max_len,
                max_size_bytes: defaults.max_size_bytes,
                ttl: defaults.ttl_seconds,
            },
        )
    }

    /// Delete a queue, its stats slot and its config entry. The unsent
    /// buffer for the name is left in place.
    pub fn remove_queue(&self, name: &str) -> Result<()> {
        let mut queues = self.write_queues();
        if queues.remove(name).is_none() {
            return Err(Error::not_found(format!("queue `{}`", name)));
        }
        drop(queues);

        self.collector.remove_queue(name);
        self.state.delete_queue(name);
        tracing::info!(queue = name, "removed queue");
        Ok(())
    }

    /// Publish a message to each named queue with the queues' default TTLs.
    pub fn publish(&self, message: &str, queue_names: &[&str]) -> Result<()> {
        self.publish_with_ttl(message, None, queue_names)
    }

    /// Publish a message to each named queue. Per-queue failures are
    /// collected into one compound error; a payload a queue refused is
    /// appended to that queue's unsent buffer.
    pub fn publish_with_ttl(
        &self,
        message: &str,
        ttl: Option<Duration>,
        queue_names: &[&str],
    ) -> Result<()> {
        if queue_names.is_empty() {
            return Err(Error::invalid_request("no queue name provided"));
        }

        let mut failures = Vec::new();
        for &name in queue_names {
            let push_result = {
                let queues = self.read_queues();
                queues.get(name).map(|queue| queue.push_with_ttl(message, ttl))
            };
            match push_result {
                None => {
                    failures.push((name.to_string(), format!("queue `{}` not found", name)));
                }
                Some(Ok(_uid)) => {}
                Some(Err(e)) => {
                    failures.push((name.to_string(), e.to_string()));
                    self.lock_unsent()
                        .entry(name.to_string())
                        .or_default()
                        .push(message.to_string());
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::PublishFailed(failures))
        }
    }

    /// Publish to every currently registered queue. Iterates a snapshot of
    /// the queue names; queues added mid-broadcast are not required to
    /// receive it.
    pub fn broadcast(&self, message: &str) -> Result<()> {
        self.broadcast_with_ttl(message, None)
    }

    pub fn broadcast_with_ttl(&self, message: &str, ttl: Option<Duration>) -> Result<()> {
        let names = self.queues();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        self.publish_with_ttl(message, ttl, &names)
    }

    /// Pop the next live message from a queue. An empty queue surfaces the
    /// queue's own error verbatim.
    pub fn consume(&self, name: &str) -> Result<String> {
        let queues = self.read_queues();
        let queue = queues
            .get(name)
            .ok_or_else(|| Error::not_found(format!("queue `{}`", name)))?;
        queue.pop()
    }

    /// Snapshot of the registered queue names, unordered.
    pub fn queues(&self) -> Vec<String> {
        self.read_queues().keys().cloned().collect()
    }

    pub fn queue_exists(&self, name: &str) -> bool {
        self.read_queues().contains_key(name)
    }

    /// Snapshot of the per-queue counters.
    pub fn stats(&self) -> HashMap<String, QueueStatsSnapshot> {
        self.collector.stats()
    }

    /// Runtime default setters; non-positive values preserve the current
    /// default.
    pub fn set_default_min_len(&self, value: i64) {
        self.state.set_default_min_len(value);
    }

    pub fn set_default_max_len(&self, value: i64) {
        self.state.set_default_max_len(value);
    }

    pub fn set_default_max_size_bytes(&self, value: i64) {
        self.state.set_default_max_size_bytes(value);
    }

    pub fn set_default_ttl(&self, seconds: i64) {
        self.state.set_default_ttl(seconds);
    }

    fn read_queues(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Queue>> {
        self.queues.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_queues(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Queue>> {
        self.queues.write().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_unsent(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<String>>> {
        self.unsent.lock().unwrap_or_else(|p| p.into_inner())
    }

    #[cfg(test)]
    fn unsent_messages(&self, name: &str) -> Vec<String> {
        self.lock_unsent().get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use tempfile::TempDir;

    fn test_broker(dir: &TempDir) -> Broker {
        let mut cfg = Configuration::default();
        cfg.disable_auto_save = true;
        cfg.broker.default_min_length = 12;
        cfg.broker.default_max_length = 128;
        cfg.broker.default_max_size_bytes = 1024 * 1024;
        cfg.broker.default_ttl = 60;
        Broker::new(Arc::new(ConfigState::new(
            cfg,
            dir.path().join("config.json"),
        )))
    }

    #[test]
    fn test_broker_basics() {
        let dir = TempDir::new().unwrap();
        let broker = test_broker(&dir);

        assert!(broker.queues().is_empty());
        assert!(matches!(
            broker.remove_queue("test"),
            Err(Error::NotFound(_))
        ));
        assert!(!broker.queue_exists("test"));

        broker.add_default_queue("test").unwrap();
        assert!(broker.queue_exists("test"));
        assert_eq!(broker.queues(), vec!["test".to_string()]);
        assert_eq!(broker.stats().len(), 1);

        assert!(matches!(
            broker.add_default_queue("test"),
            Err(Error::AlreadyExists(_))
        ));

        broker.remove_queue("test").unwrap();
        assert!(broker.queues().is_empty());
        assert!(
            !broker.stats().contains_key("test"),
            "deleting a queue erases its counters"
        );
    }

    #[test]
    fn test_publish_and_consume() {
        let dir = TempDir::new().unwrap();
        let broker = test_broker(&dir);

        assert!(matches!(broker.consume("test"), Err(Error::NotFound(_))));

        broker.add_default_queue("test").unwrap();
        assert!(matches!(broker.consume("test"), Err(Error::QueueEmpty)));

        assert!(matches!(
            broker.publish("my test message", &[]),
            Err(Error::InvalidRequest(_))
        ));

        let err = broker
            .publish("my test message", &["nonexistentqueue"])
            .unwrap_err();
        assert!(err.to_string().contains("nonexistentqueue"));

        broker.publish("my test message", &["test"]).unwrap();
        assert_eq!(broker.consume("test").unwrap(), "my test message");
    }

    #[test]
    fn test_publish_with_ttl_expires() {
        let dir = TempDir::new().unwrap();
        let broker = test_broker(&dir);
        broker.add_default_queue("test").unwrap();

        broker
            .publish_with_ttl("fast disappearing", Some(Duration::milliseconds(1)), &["test"])
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(matches!(broker.consume("test"), Err(Error::QueueEmpty)));
        assert_eq!(broker.stats()["test"].dropped, 1);
    }

    #[test]
    fn test_broadcast_reaches_every_queue() {
        let dir = TempDir::new().unwrap();
        let broker = test_broker(&dir);
        broker.add_default_queue("test1").unwrap();
        broker.add_default_queue("test2").unwrap();

        broker.broadcast("my test message").unwrap();

        assert_eq!(broker.consume("test1").unwrap(), "my test message");
        assert_eq!(broker.consume("test2").unwrap(), "my test message");
    }

    #[test]
    fn test_full_queue_appends_unsent() {
        let dir = TempDir::new().unwrap();
        let broker = test_broker(&dir);
        broker
            .add_queue(
                "tiny",
                QueueConfig {
                    min_length: 1,
                    max_length: 1,
                    max_size_bytes: 0,
                    ttl: 0,
                },
            )
            .unwrap();

        broker.publish("first", &["tiny"]).unwrap();
        let err = broker.publish("second", &["tiny"]).unwrap_err();
        assert!(matches!(err, Error::PublishFailed(_)));
        assert_eq!(broker.unsent_messages("tiny"), vec!["second".to_string()]);

        // The unsent journal outlives the queue itself.
        broker.remove_queue("tiny").unwrap();
        assert_eq!(broker.unsent_messages("tiny"), vec!["second".to_string()]);
    }

    #[test]
    fn test_partial_publish_failure_is_compound() {
        let dir = TempDir::new().unwrap();
        let broker = test_broker(&dir);
        broker.add_default_queue("good").unwrap();

        let err = broker.publish("msg", &["good", "missing"]).unwrap_err();
        let Error::PublishFailed(failures) = err else {
            panic!("expected compound publish failure");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "missing");

        // The good queue still holds the message.
        assert_eq!(broker.consume("good").unwrap(), "msg");
    }

    #[test]
    fn test_add_queue_mirrors_resolved_config() {
        let dir = TempDir::new().unwrap();
        let broker = test_broker(&dir);
        broker
            .add_queue(
                "mirrored",
                QueueConfig {
                    min_length: -1,
                    max_length: 0,
                    max_size_bytes: 64,
                    ttl: 0,
                },
            )
            .unwrap();

        let cfg = broker.state.running_config();
        let entry = cfg.broker.queues["mirrored"];
        assert_eq!(entry.min_length, 12, "negative min resolves to default");
        assert_eq!(entry.max_length, 128);
        assert_eq!(entry.max_size_bytes, 64);
        assert_eq!(entry.ttl, 60);

        broker.remove_queue("mirrored").unwrap();
        assert!(broker
            .state
            .running_config()
            .broker
            .queues
            .is_empty());
    }

    #[test]
    fn test_queue_name_validation() {
        assert!(is_valid_queue_name("jobs"));
        assert!(is_valid_queue_name("jobs-2"));
        assert!(is_valid_queue_name("dead_letter"));
        assert!(is_valid_queue_name("/jobs/"));
        assert!(is_valid_queue_name("JOBS"));

        assert!(!is_valid_queue_name(""));
        assert!(!is_valid_queue_name("/"));
        assert!(!is_valid_queue_name("a b"));
        assert!(!is_valid_queue_name("a/b"));
        assert!(!is_valid_queue_name("sneaky!"));

        assert!(!is_valid_queue_name("broadcast"));
        assert!(!is_valid_queue_name("/broadcast/"));
        assert!(!is_valid_queue_name("BROADCAST"));
    }

    #[test]
    fn test_concurrent_queue_management() {
        let dir = TempDir::new().unwrap();
        let broker = Arc::new(test_broker(&dir));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let broker = Arc::clone(&broker);
                std::thread::spawn(move || {
                    let name = format!("q{}", i);
                    broker.add_default_queue(&name).unwrap();
                    broker.publish("msg", &[name.as_str()]).unwrap();
                    assert_eq!(broker.consume(&name).unwrap(), "msg");
                    if i % 2 == 0 {
                        broker.remove_queue(&name).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut names = broker.queues();
        names.sort();
        assert_eq!(names, vec!["q1", "q3", "q5", "q7"]);
        for name in names {
            assert_eq!(broker.stats()[&name].processed, 1);
        }
    }

    #[test]
    fn test_defaults_stickiness() {
        let dir = TempDir::new().unwrap();
        let broker = test_broker(&dir);

        broker.set_default_min_len(0);
        broker.set_default_max_len(0);
        broker.set_default_max_size_bytes(0);
        broker.set_default_ttl(0);

        let defaults = broker.state.broker_defaults();
        assert_eq!(defaults.min_len, 12);
        assert_eq!(defaults.max_len, 128);
        assert_eq!(defaults.max_size_bytes, 1024 * 1024);
        assert_eq!(defaults.ttl_seconds, 60);

        broker.set_default_min_len(7);
        broker.set_default_ttl(90);
        let defaults = broker.state.broker_defaults();
        assert_eq!(defaults.min_len, 7);
        assert_eq!(defaults.ttl_seconds, 90);
    }
}
