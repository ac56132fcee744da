//! The logging front end used in producer processes.
//!
//! A `Producer` is a named logger bound to a `LogContext`. Before a record is
//! emitted it passes through an ordered list of `MessageTransform`s, each
//! free to rewrite the message or attach attributes.

use crate::context::LogContext;
use crate::dictconfig::DictConfig;
use crate::envelope::{ConfigDirective, Envelope};
use crate::filter::Filter;
use crate::fmt::Formatter;
use crate::internal;
use crate::level::Level;
use crate::record::{LogRecord, SourceLocation};
use crate::sink::Handler;
use serde_json::{Map, Value};
use std::panic::Location;
use std::sync::Arc;

/// Rewrites a record before it is emitted.
pub type MessageTransform = Arc<dyn Fn(&mut LogRecord) + Send + Sync>;

/// Ready-made transforms.
pub mod transform {
    use super::MessageTransform;
    use serde_json::Value;
    use std::sync::Arc;

    /// Sets one `extra` attribute on every record, e.g. a message type tag.
    #[must_use]
    pub fn with_extra(key: impl Into<String>, value: impl Into<Value>) -> MessageTransform {
        let key = key.into();
        let value = value.into();
        Arc::new(move |record| {
            record.extra.insert(key.clone(), value.clone());
        })
    }

    /// Prefixes every message.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> MessageTransform {
        let prefix = prefix.into();
        Arc::new(move |record| {
            record.msg.insert_str(0, &prefix);
        })
    }
}

pub struct Producer {
    name: String,
    context: LogContext,
    level: Option<Level>,
    transforms: Vec<MessageTransform>,
    handler: Handler,
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("transforms", &self.transforms.len())
            .finish_non_exhaustive()
    }
}

impl Producer {
    /// Everything passes the local level gate until `level` is set.
    #[must_use]
    pub fn new(name: impl Into<String>, context: &LogContext) -> Self {
        let name = name.into();
        Self {
            handler: Handler::new(context.queue_sink()).name(format!("{name}.queue")),
            name,
            context: context.clone(),
            level: None,
            transforms: Vec::new(),
        }
    }

    #[must_use]
    pub const fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Applied after every transform added before it.
    #[must_use]
    pub fn transform(mut self, transform: MessageTransform) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Renders the message before it is queued (default `%(message)s`).
    #[must_use]
    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.handler = self.handler.formatter(formatter);
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.handler = self.handler.filter(filter);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn context(&self) -> &LogContext {
        &self.context
    }

    #[must_use]
    pub fn is_enabled_for(&self, level: Level) -> bool {
        self.level.is_none_or(|min| level >= min)
    }

    /// Builds, transforms and queues one record.
    ///
    /// Never fails: queue errors are reported on the diagnostic channel.
    #[track_caller]
    pub fn log(&self, level: Level, msg: &str) {
        self.emit(level, msg, Map::new(), Location::caller());
    }

    /// `log` with extra attributes merged into the record.
    #[track_caller]
    pub fn log_with(&self, level: Level, msg: &str, extra: Map<String, Value>) {
        self.emit(level, msg, extra, Location::caller());
    }

    #[track_caller]
    pub fn trace(&self, msg: &str) {
        self.emit(Level::Trace, msg, Map::new(), Location::caller());
    }

    #[track_caller]
    pub fn debug(&self, msg: &str) {
        self.emit(Level::Debug, msg, Map::new(), Location::caller());
    }

    #[track_caller]
    pub fn info(&self, msg: &str) {
        self.emit(Level::Info, msg, Map::new(), Location::caller());
    }

    #[track_caller]
    pub fn warn(&self, msg: &str) {
        self.emit(Level::Warn, msg, Map::new(), Location::caller());
    }

    #[track_caller]
    pub fn error(&self, msg: &str) {
        self.emit(Level::Error, msg, Map::new(), Location::caller());
    }

    #[track_caller]
    pub fn critical(&self, msg: &str) {
        self.emit(Level::Critical, msg, Map::new(), Location::caller());
    }

    fn emit(&self, level: Level, msg: &str, extra: Map<String, Value>, caller: &Location<'_>) {
        if !self.is_enabled_for(level) {
            return;
        }
        let mut location = SourceLocation::from_caller(caller);
        location.module = Some(self.name.clone());
        let mut record = LogRecord::new(self.name.clone(), level, msg).with_location(location);
        record.extra.extend(extra);
        for transform in &self.transforms {
            transform(&mut record);
        }
        // The handler reports its own failures; it is built without raise_errors.
        let _ = self.handler.handle(&record);
    }

    /// Ships a dict-config to the listener.
    ///
    /// # Errors
    /// The config is invalid or the queue refuses the envelope.
    pub fn configure(&self, config: DictConfig) -> Result<(), crate::Error> {
        config.validate()?;
        self.send(&Envelope::config(ConfigDirective::Dict(config)))
    }

    /// Changes this logger's level on the listener side.
    ///
    /// # Errors
    /// The queue refuses the envelope.
    pub fn set_remote_level(&self, level: Option<Level>) -> Result<(), crate::Error> {
        self.send(&Envelope::config(ConfigDirective::SetLevel {
            logger: self.name.clone(),
            level,
        }))
    }

    fn send(&self, envelope: &Envelope) -> Result<(), crate::Error> {
        self.context.send(envelope).inspect_err(|e| {
            internal::warn(
                "PRODUCER",
                &format!("{}: config directive not queued: {e}", self.name),
            );
        })
    }
}
