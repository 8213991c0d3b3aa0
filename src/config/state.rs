//! Running-configuration state.
//!
//! A single [`ConfigState`] is constructed at startup and shared (by `Arc`)
//! with the broker and every server. It owns the process-wide running
//! configuration behind a read/write lock and persists it to the startup
//! configuration file after every mutation, unless auto-save is disabled.
//! Auto-save failures are logged and swallowed; they never fail the caller
//! that triggered the save.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::config::{BrokerConfig, Configuration, QueueConfig};
use crate::types::{Error, Result};

/// Snapshot of the broker defaults used for queue-option resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerDefaults {
    pub min_len: i64,
    pub max_len: i64,
    pub max_size_bytes: i64,
    pub ttl_seconds: i64,
}

impl From<&BrokerConfig> for BrokerDefaults {
    fn from(broker: &BrokerConfig) -> Self {
        Self {
            min_len: broker.default_min_length,
            max_len: broker.default_max_length,
            max_size_bytes: broker.default_max_size_bytes,
            ttl_seconds: broker.default_ttl,
        }
    }
}

struct Inner {
    config: Configuration,
    auto_save_disabled: bool,
}

/// Process-wide running configuration with an auto-persist policy.
pub struct ConfigState {
    path: PathBuf,
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for ConfigState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigState")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ConfigState {
    /// Build the state from the startup configuration (or an empty default).
    ///
    /// Non-positive broker defaults are replaced with the factory values so
    /// option resolution always has something sane to fall back on.
    /// Construction itself never writes the file; only mutations do.
    pub fn new(mut config: Configuration, path: impl Into<PathBuf>) -> Self {
        config.broker.normalize_defaults();
        let auto_save_disabled = config.disable_auto_save;
        Self {
            path: path.into(),
            inner: RwLock::new(Inner {
                config,
                auto_save_disabled,
            }),
        }
    }

    /// The startup configuration file path this state persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deep copy of the running configuration.
    pub fn running_config(&self) -> Configuration {
        self.read().config.clone()
    }

    /// Replace the whole running configuration.
    pub fn set_running_config(&self, config: Configuration) {
        let mut inner = self.write();
        inner.auto_save_disabled = config.disable_auto_save;
        inner.config = config;
        inner.config.broker.normalize_defaults();
        self.auto_save(&inner);
    }

    /// Toggle the auto-persist policy. The flag itself is persisted, so
    /// re-enabling writes the file immediately.
    pub fn set_auto_save_disabled(&self, disabled: bool) {
        let mut inner = self.write();
        inner.config.disable_auto_save = disabled;
        inner.auto_save_disabled = disabled;
        self.auto_save(&inner);
    }

    /// Record a queue in the topology.
    pub fn create_queue(&self, name: &str, queue: QueueConfig) {
        let mut inner = self.write();
        inner.config.broker.queues.insert(name.to_string(), queue);
        self.auto_save(&inner);
    }

    /// Remove a queue from the topology.
    pub fn delete_queue(&self, name: &str) {
        let mut inner = self.write();
        inner.config.broker.queues.remove(name);
        self.auto_save(&inner);
    }

    /// Current broker defaults.
    pub fn broker_defaults(&self) -> BrokerDefaults {
        BrokerDefaults::from(&self.read().config.broker)
    }

    /// Update the default minimum length. Non-positive values preserve the
    /// current default.
    pub fn set_default_min_len(&self, value: i64) {
        self.set_default(value, |broker, v| broker.default_min_length = v);
    }

    /// Update the default maximum length. Non-positive values preserve the
    /// current default.
    pub fn set_default_max_len(&self, value: i64) {
        self.set_default(value, |broker, v| broker.default_max_length = v);
    }

    /// Update the default byte cap. Non-positive values preserve the current
    /// default.
    pub fn set_default_max_size_bytes(&self, value: i64) {
        self.set_default(value, |broker, v| broker.default_max_size_bytes = v);
    }

    /// Update the default TTL, in seconds. Non-positive values preserve the
    /// current default.
    pub fn set_default_ttl(&self, seconds: i64) {
        self.set_default(seconds, |broker, v| broker.default_ttl = v);
    }

    fn set_default(&self, value: i64, apply: impl FnOnce(&mut BrokerConfig, i64)) {
        if value <= 0 {
            return;
        }
        let mut inner = self.write();
        apply(&mut inner.config.broker, value);
        self.auto_save(&inner);
    }

    /// Persist the running configuration to the startup configuration file.
    pub fn copy_running_config_to_startup_config(&self) -> Result<()> {
        let inner = self.read();
        save(&inner.config, &self.path)
    }

    /// Reload the startup configuration from disk.
    pub fn startup_config(&self) -> Result<Configuration> {
        Configuration::from_file(&self.path)
    }

    fn auto_save(&self, inner: &Inner) {
        if inner.auto_save_disabled {
            return;
        }
        if let Err(e) = save(&inner.config, &self.path) {
            tracing::error!("failed to auto save configuration: {}", e);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        // A poisoned lock means a panic while holding it; the configuration
        // itself is still a coherent value.
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }
}

fn save(config: &Configuration, path: &Path) -> Result<()> {
    let encoded = serde_json::to_vec_pretty(config)?;
    std::fs::write(path, encoded)
        .map_err(|e| Error::config(format!("failed to write `{}`: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_LEN;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn state_in(dir: &TempDir) -> ConfigState {
        ConfigState::new(Configuration::default(), dir.path().join("config.json"))
    }

    #[test]
    fn test_construction_does_not_write_the_file() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);
        assert!(matches!(
            state.startup_config().unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn test_mutation_auto_saves_matching_config() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);

        state.create_queue("jobs", QueueConfig::default());

        let on_disk = state.startup_config().unwrap();
        assert_eq!(on_disk, state.running_config());
        assert!(on_disk.broker.queues.contains_key("jobs"));
    }

    #[test]
    fn test_disable_auto_save_suppresses_writes() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Configuration::default();
        cfg.disable_auto_save = true;
        let state = ConfigState::new(cfg, dir.path().join("config.json"));

        state.create_queue("jobs", QueueConfig::default());
        state.set_default_ttl(30);

        assert!(matches!(
            state.startup_config().unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn test_explicit_save_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Configuration::default();
        cfg.disable_auto_save = true;
        cfg.broker.default_ttl = 42;
        let state = ConfigState::new(cfg, dir.path().join("config.json"));

        state.copy_running_config_to_startup_config().unwrap();
        assert_eq!(state.startup_config().unwrap(), state.running_config());
    }

    #[test]
    fn test_running_config_is_a_deep_copy() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);
        state.create_queue("jobs", QueueConfig::default());

        let mut copy = state.running_config();
        copy.broker.queues.remove("jobs");
        copy.broker.default_ttl = 999;

        assert!(state.running_config().broker.queues.contains_key("jobs"));
        assert_eq!(state.broker_defaults().ttl_seconds, 0);
    }

    #[test]
    fn test_default_setters_preserve_on_non_positive() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);

        state.set_default_max_len(0);
        state.set_default_max_len(-7);
        assert_eq!(state.broker_defaults().max_len, DEFAULT_MAX_LEN);

        state.set_default_max_len(512);
        assert_eq!(state.broker_defaults().max_len, 512);

        state.set_default_ttl(0);
        assert_eq!(state.broker_defaults().ttl_seconds, 0);
        state.set_default_ttl(90);
        state.set_default_ttl(-1);
        assert_eq!(state.broker_defaults().ttl_seconds, 90);
    }

    #[test]
    fn test_set_running_config_updates_auto_save_flag() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);

        let mut next = Configuration::default();
        next.disable_auto_save = true;
        next.broker.default_min_length = 7;
        state.set_running_config(next);

        // The replacement itself ran with auto-save already disabled.
        assert!(matches!(
            state.startup_config().unwrap_err(),
            Error::NotFound(_)
        ));
        assert_eq!(state.broker_defaults().min_len, 7);
    }

    #[test]
    fn test_delete_queue_removes_topology_entry() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);
        state.create_queue("jobs", QueueConfig::default());
        state.delete_queue("jobs");

        assert!(state.running_config().broker.queues.is_empty());
        assert!(state
            .startup_config()
            .unwrap()
            .broker
            .queues
            .is_empty());
    }
}
