//! Observability utilities.

use std::path::Path;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogConfig;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Initialize tracing once for the process.
///
/// The level comes from the `log.level` configuration field (empty means
/// `info`); `RUST_LOG` overrides it when set. A non-empty `log.file` adds a
/// plain-text file sink next to the stdout one.
pub fn init_tracing(config: &LogConfig) {
    let config = config.clone();
    TRACING_INIT.get_or_init(move || {
        let level = if config.level.is_empty() {
            "info"
        } else {
            config.level.as_str()
        };
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
        });

        let result = if config.file.is_empty() {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact())
                .try_init()
        } else {
            let path = Path::new(&config.file);
            let dir = match path.parent() {
                Some(parent) if parent != Path::new("") => parent,
                _ => Path::new("."),
            };
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "yambol.log".to_string());
            let appender = tracing_appender::rolling::never(dir, file_name);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(appender).with_ansi(false))
                .try_init()
        };

        if let Err(err) = result {
            eprintln!("tracing init skipped: {err}");
        }
    });
}
