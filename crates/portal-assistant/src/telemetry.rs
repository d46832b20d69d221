//! Subscriber setup for the binary.
//!
//! Console output goes to stderr so replies on stdout stay clean. Every
//! event that passes the filter is also captured in a [`LogStore`], which
//! the returned [`LoggingGuard`] owns.

use portal_llm::{LogEntry, LogStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Owner of the captured log; close it with [`LoggingGuard::shutdown`]
#[must_use = "dropping the guard closes the log store"]
#[derive(Debug)]
pub struct LoggingGuard {
    store: LogStore,
}

impl LoggingGuard {
    pub fn store(&self) -> &LogStore {
        &self.store
    }

    /// Stop capturing and return whatever is still buffered
    pub fn shutdown(self) -> Vec<LogEntry> {
        tracing::debug!("Log capture shutting down");
        self.store.close()
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        if !self.store.is_closed() {
            self.store.close();
        }
    }
}

/// Filter precedence: `--log-level`, then `RUST_LOG`, then the settings file, then "info"
pub fn env_filter(config: &LoggingConfig, level_override: Option<&str>) -> anyhow::Result<EnvFilter> {
    if let Some(level) = level_override {
        return EnvFilter::try_new(level)
            .map_err(|e| anyhow::anyhow!("Invalid --log-level '{}': {}", level, e));
    }

    Ok(EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info")))
}

/// Install the global subscriber. Fails if one is already set.
pub fn init(config: &LoggingConfig, level_override: Option<&str>) -> anyhow::Result<LoggingGuard> {
    let store = LogStore::new(config.capture.clone());
    let registry = tracing_subscriber::registry()
        .with(env_filter(config, level_override)?)
        .with(store.layer());

    match config.format.as_str() {
        "json" => {
            let console = config.console_output.then(|| {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
            });
            registry.with(console).try_init()?;
        }
        _ => {
            let console = config.console_output.then(|| {
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
            });
            registry.with(console).try_init()?;
        }
    }

    tracing::debug!(
        format = %config.format,
        level = level_override.unwrap_or(config.level.as_str()),
        capture_level = %store.config().level,
        "Logging initialized"
    );
    Ok(LoggingGuard { store })
}
