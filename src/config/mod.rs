//! Configuration structures and file I/O.
//!
//! The configuration file is JSON, located at `$YAMBOL_CONFIG` or
//! `./config.json`. Unknown fields are ignored on decode; the write side
//! produces indented JSON. All TTL fields are integer seconds.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::types::{Error, Result};

mod state;

pub use state::{BrokerDefaults, ConfigState};

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "YAMBOL_CONFIG";

/// Configuration file name used when `YAMBOL_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Default listen ports, used when the configured port is non-positive.
pub const DEFAULT_REST_PORT: u16 = 21419;
pub const DEFAULT_REST_TLS_PORT: u16 = 21420;
pub const DEFAULT_GRPC_PORT: u16 = 21421;
pub const DEFAULT_GRPC_TLS_PORT: u16 = 21422;
pub const DEFAULT_FRONTEND_PORT: u16 = 21423;
pub const DEFAULT_FRONTEND_TLS_PORT: u16 = 21424;

/// Factory broker defaults, applied wherever a configured default is
/// non-positive.
pub const DEFAULT_MIN_LEN: i64 = 100;
pub const DEFAULT_MAX_LEN: i64 = 1 << 30;
pub const DEFAULT_MAX_SIZE_BYTES: i64 = 1024 * 1024 * 1024; // 1GB
pub const DEFAULT_TTL_SECONDS: i64 = 0; // never expires

/// Resolve the configuration file path at process start.
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Full process configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub disable_auto_save: bool,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl Configuration {
    /// Load a configuration from a JSON file.
    ///
    /// A missing file surfaces as [`Error::NotFound`] so callers can
    /// distinguish "no startup config yet" from a malformed one.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found(format!("config file `{}`", path.display()))
            } else {
                Error::config(format!(
                    "failed to open config file `{}`: {}",
                    path.display(),
                    e
                ))
            }
        })?;
        serde_json::from_slice(&raw).map_err(|e| {
            Error::config(format!(
                "failed to decode config file `{}`: {}",
                path.display(),
                e
            ))
        })
    }
}

/// Enable/port/TLS triples for each API surface plus the shared key pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub rest: SurfaceConfig,

    #[serde(default)]
    pub grpc: SurfaceConfig,

    #[serde(default)]
    pub http: SurfaceConfig,

    /// Path to the PEM certificate used by every TLS-enabled surface.
    #[serde(default)]
    pub certificate: String,

    /// Path to the PEM private key used by every TLS-enabled surface.
    #[serde(default)]
    pub key: String,
}

/// One API surface: enabled flag, listen port, TLS switch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub port: i64,

    #[serde(default)]
    pub tls_enabled: bool,
}

impl SurfaceConfig {
    /// The port to bind: the configured one when positive, otherwise the
    /// surface default for the active TLS mode.
    pub fn resolve_port(&self, insecure_default: u16, tls_default: u16) -> u16 {
        if self.port > 0 {
            self.port as u16
        } else if self.tls_enabled {
            tls_default
        } else {
            insecure_default
        }
    }
}

/// Broker defaults and the queue topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_min_len")]
    pub default_min_length: i64,

    #[serde(default = "default_max_len")]
    pub default_max_length: i64,

    #[serde(default = "default_max_size_bytes")]
    pub default_max_size_bytes: i64,

    /// Seconds; 0 means newly created items never expire.
    #[serde(default)]
    pub default_ttl: i64,

    #[serde(default)]
    pub queues: HashMap<String, QueueConfig>,
}

fn default_min_len() -> i64 {
    DEFAULT_MIN_LEN
}

fn default_max_len() -> i64 {
    DEFAULT_MAX_LEN
}

fn default_max_size_bytes() -> i64 {
    DEFAULT_MAX_SIZE_BYTES
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            default_min_length: DEFAULT_MIN_LEN,
            default_max_length: DEFAULT_MAX_LEN,
            default_max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            default_ttl: DEFAULT_TTL_SECONDS,
            queues: HashMap::new(),
        }
    }
}

impl BrokerConfig {
    /// Replace non-positive defaults with the factory values. The default
    /// TTL is clamped to zero instead (zero is a meaningful TTL).
    pub(crate) fn normalize_defaults(&mut self) {
        if self.default_min_length <= 0 {
            self.default_min_length = DEFAULT_MIN_LEN;
        }
        if self.default_max_length <= 0 {
            self.default_max_length = DEFAULT_MAX_LEN;
        }
        if self.default_max_size_bytes <= 0 {
            self.default_max_size_bytes = DEFAULT_MAX_SIZE_BYTES;
        }
        if self.default_ttl < 0 {
            self.default_ttl = 0;
        }
    }
}

/// Per-queue settings as they appear in the file and in queue-create bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub min_length: i64,

    #[serde(default)]
    pub max_length: i64,

    #[serde(default)]
    pub max_size_bytes: i64,

    /// Seconds; 0 means items never expire.
    #[serde(default)]
    pub ttl: i64,
}

/// Logger level and optional log file path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// One of `debug`, `info`, `warn`, `error`; empty means `info`.
    #[serde(default)]
    pub level: String,

    /// Path of the file sink; empty disables file logging.
    #[serde(default)]
    pub file: String,
}
