//! In-memory log capture.
//!
//! [`LogStore`] is an explicitly constructed, cloneable handle around a
//! bounded buffer of [`LogEntry`]s. It is fed through [`LogStoreLayer`], a
//! `tracing_subscriber` layer, so everything the client logs with `tracing`
//! can be read back or exported as JSON by the front-end. Nothing here is
//! global: the owner decides when the store is created, which subscriber it
//! is attached to, and when it is closed.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

pub const DEFAULT_MAX_STORED_LOGS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" | "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        if level == Level::ERROR {
            Self::Error
        } else if level == Level::WARN {
            Self::Warn
        } else if level == Level::INFO {
            Self::Info
        } else {
            Self::Debug
        }
    }
}

/// Capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogStoreConfig {
    pub enabled: bool,
    /// Entries below this level are dropped
    pub level: LogLevel,
    pub store_logs: bool,
    /// Oldest entries are evicted beyond this count
    pub max_stored_logs: usize,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: LogLevel::Info,
            store_logs: true,
            max_stored_logs: DEFAULT_MAX_STORED_LOGS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub target: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug)]
struct Inner {
    config: LogStoreConfig,
    entries: VecDeque<LogEntry>,
    closed: bool,
}

/// Bounded, shareable log buffer
#[derive(Debug, Clone)]
pub struct LogStore {
    inner: Arc<Mutex<Inner>>,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new(LogStoreConfig::default())
    }
}

impl LogStore {
    pub fn new(config: LogStoreConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: VecDeque::with_capacity(config.max_stored_logs),
                config,
                closed: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Entries are pushed and popped whole, so a poisoned buffer is still consistent
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn config(&self) -> LogStoreConfig {
        self.lock().config.clone()
    }

    /// Whether an entry at `level` would currently be kept
    pub fn accepts(&self, level: LogLevel) -> bool {
        let inner = self.lock();
        !inner.closed
            && inner.config.enabled
            && inner.config.store_logs
            && level >= inner.config.level
    }

    pub fn record(
        &self,
        level: LogLevel,
        target: impl Into<String>,
        message: impl Into<String>,
        data: Option<Value>,
    ) {
        let mut inner = self.lock();
        if inner.closed
            || !inner.config.enabled
            || !inner.config.store_logs
            || level < inner.config.level
        {
            return;
        }

        inner.entries.push_back(LogEntry {
            timestamp: Utc::now(),
            level,
            target: target.into(),
            message: message.into(),
            data,
        });

        while inner.entries.len() > inner.config.max_stored_logs {
            inner.entries.pop_front();
        }
    }

    /// Stored entries, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Pretty-printed JSON array of the stored entries
    pub fn export_json(&self) -> serde_json::Result<String> {
        let inner = self.lock();
        serde_json::to_string_pretty(&inner.entries)
    }

    /// Stop accepting entries and hand back what was captured
    pub fn close(&self) -> Vec<LogEntry> {
        let mut inner = self.lock();
        inner.closed = true;
        inner.entries.drain(..).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Layer that feeds this store from a `tracing` subscriber
    pub fn layer(&self) -> LogStoreLayer {
        LogStoreLayer {
            store: self.clone(),
        }
    }
}

/// `tracing_subscriber` layer recording events into a [`LogStore`].
///
/// The `message` field becomes [`LogEntry::message`]; all other fields are
/// collected into [`LogEntry::data`]. An ERROR event carrying `fatal = true`
/// is stored as [`LogLevel::Fatal`].
pub struct LogStoreLayer {
    store: LogStore,
}

impl<S> Layer<S> for LogStoreLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut level = LogLevel::from(*metadata.level());
        if !self.store.accepts(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        if level == LogLevel::Error
            && visitor.fields.remove("fatal") == Some(Value::Bool(true))
        {
            level = LogLevel::Fatal;
        }

        let data = if visitor.fields.is_empty() {
            None
        } else {
            Some(Value::Object(visitor.fields))
        };

        self.store.record(level, metadata.target(), visitor.message, data);
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }
}
