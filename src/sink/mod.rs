//! Delivery backends. A `Sink` knows how to put a formatted record somewhere;
//! a `Handler` wraps one with the level, filters and formatter a dict-config
//! `handlers` entry describes.

pub mod batch;
pub mod database;
pub mod file;
pub mod queue;
pub mod smtp;
pub mod stream;

pub use batch::{BatchingSink, BufferedRecord, ClearPolicy, Deliver};
pub use database::{Collection, DatabaseDeliver, DatabaseSink, JsonlCollection};
pub use file::{Rotation, TimedRotatingFileSink};
pub use queue::QueueSink;
pub use smtp::{SmtpDeliver, SmtpGranularity, SmtpSettings};
pub use stream::{StreamSink, StreamTarget};

use crate::filter::Filter;
use crate::fmt::Formatter;
use crate::internal;
use crate::level::Level;
use crate::record::LogRecord;
use std::sync::Arc;

/// `Send + Sync` because one handler may be shared by several loggers and
/// invoked from concurrent dispatch workers.
pub trait Sink: Send + Sync {
    /// Delivers (or buffers) one record rendered through `formatter`.
    ///
    /// # Errors
    /// Delivery failures from the backend.
    fn emit(&self, record: &LogRecord, formatter: &Formatter) -> Result<(), crate::Error>;

    /// Pushes anything buffered to the backend.
    ///
    /// # Errors
    /// Delivery failures from the backend.
    fn flush(&self) -> Result<(), crate::Error> {
        Ok(())
    }

    /// Called when a reconfiguration replaces the handler.
    ///
    /// # Errors
    /// Delivery failures from the final flush.
    fn close(&self) -> Result<(), crate::Error> {
        self.flush()
    }
}

/// Discards everything. Backs the `null` handler class.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl Sink for NullSink {
    fn emit(&self, _record: &LogRecord, _formatter: &Formatter) -> Result<(), crate::Error> {
        Ok(())
    }
}

/// A sink plus the gating and rendering configured around it.
pub struct Handler {
    name: String,
    level: Option<Level>,
    filters: Vec<Arc<dyn Filter>>,
    formatter: Formatter,
    sink: Box<dyn Sink>,
    raise_errors: bool,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("filters", &self.filters.len())
            .field("raise_errors", &self.raise_errors)
            .finish_non_exhaustive()
    }
}

impl Handler {
    /// A handler with no level threshold, no filters and a `%(message)s` formatter.
    #[must_use]
    pub fn new(sink: impl Sink + 'static) -> Self {
        Self::from_boxed(Box::new(sink))
    }

    #[must_use]
    pub fn from_boxed(sink: Box<dyn Sink>) -> Self {
        Self {
            name: String::new(),
            level: None,
            filters: Vec::new(),
            formatter: Formatter::default(),
            sink,
            raise_errors: false,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Records below `level` are ignored; `None` accepts everything.
    #[must_use]
    pub const fn level(mut self, level: Option<Level>) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    #[must_use]
    pub fn shared_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Propagate delivery errors to the caller instead of only reporting them.
    #[must_use]
    pub const fn raise_errors(mut self, raise: bool) -> Self {
        self.raise_errors = raise;
        self
    }

    #[must_use]
    pub fn handler_name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn threshold(&self) -> Option<Level> {
        self.level
    }

    /// Level check plus every filter.
    #[must_use]
    pub fn accepts(&self, record: &LogRecord) -> bool {
        if self.level.is_some_and(|min| record.level < min) {
            return false;
        }
        self.filters.iter().all(|f| f.filter(record))
    }

    /// Emits the record if it passes, returning whether it was emitted.
    ///
    /// # Errors
    /// Only when `raise_errors` is set; otherwise failures are reported to the
    /// internal logger and swallowed.
    pub fn handle(&self, record: &LogRecord) -> Result<bool, crate::Error> {
        if !self.accepts(record) {
            return Ok(false);
        }
        match self.sink.emit(record, &self.formatter) {
            Ok(()) => Ok(true),
            Err(e) => self.report("emit", e).map(|()| true),
        }
    }

    /// # Errors
    /// Only when `raise_errors` is set.
    pub fn flush(&self) -> Result<(), crate::Error> {
        self.sink.flush().or_else(|e| self.report("flush", e))
    }

    /// # Errors
    /// Only when `raise_errors` is set.
    pub fn close(&self) -> Result<(), crate::Error> {
        self.sink.close().or_else(|e| self.report("close", e))
    }

    fn report(&self, action: &str, err: crate::Error) -> Result<(), crate::Error> {
        let name = if self.name.is_empty() {
            "<anonymous>"
        } else {
            &self.name
        };
        internal::error("HANDLER", &format!("{name}: {action} failed: {err}"));
        if self.raise_errors { Err(err) } else { Ok(()) }
    }
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn emit(&self, record: &LogRecord, formatter: &Formatter) -> Result<(), crate::Error> {
        (**self).emit(record, formatter)
    }

    fn flush(&self) -> Result<(), crate::Error> {
        (**self).flush()
    }

    fn close(&self) -> Result<(), crate::Error> {
        (**self).close()
    }
}
