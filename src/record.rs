//! The serializable log record carried inside an envelope.

use crate::level::Level;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::panic::Location;

/// Where the log call was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub pathname: String,
    pub lineno: u32,
    /// Logical module path; producers fill it with the logger name when unknown.
    #[serde(default)]
    pub module: Option<String>,
}

impl SourceLocation {
    /// Captures the caller of a `#[track_caller]` function.
    #[must_use]
    pub fn from_caller(location: &Location<'_>) -> Self {
        Self {
            pathname: location.file().to_string(),
            lineno: location.line(),
            module: None,
        }
    }

    /// Final path component, as rendered by `%(filename)s`.
    #[must_use]
    pub fn filename(&self) -> &str {
        self.pathname
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.pathname)
    }
}

/// Everything a handler needs to render one record, independent of the process that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Dotted logger name; selects the registry entry on the listener side.
    pub name: String,
    pub level: Level,
    pub msg: String,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    #[serde(default)]
    pub thread: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_name: Option<String>,
    #[serde(default)]
    pub process: u32,
    /// Pre-rendered error/backtrace text, appended by formatters on its own line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exc_text: Option<String>,
    /// Arbitrary attributes; formatters can reference them by key.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl LogRecord {
    /// Builds a record stamped with the current time, thread and process.
    #[must_use]
    pub fn new(name: impl Into<String>, level: Level, msg: impl Into<String>) -> Self {
        let current = std::thread::current();
        Self {
            name: name.into(),
            level,
            msg: msg.into(),
            created: Utc::now(),
            location: None,
            thread: format!("{:?}", current.id()),
            thread_name: current.name().map(ToString::to_string),
            process: std::process::id(),
            exc_text: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_exc_text(mut self, text: impl Into<String>) -> Self {
        self.exc_text = Some(text.into());
        self
    }

    /// Looks up an extra attribute.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}
