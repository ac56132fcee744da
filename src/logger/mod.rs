//! A named logger: the registry entry records are routed to.
//!
//! Unlike a producer, a `Logger` is mutable in place so a config directive can
//! swap its level, filters and handlers while dispatch workers hold an `Arc`
//! to it.

mod builder;

pub use builder::{FileBuilder, LoggerBuilder, StreamBuilder};

use crate::filter::Filter;
use crate::level::Level;
use crate::record::LogRecord;
use crate::sink::Handler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

pub struct Logger {
    name: String,
    level: RwLock<Option<Level>>,
    propagate: AtomicBool,
    disabled: AtomicBool,
    filters: RwLock<Vec<Arc<dyn Filter>>>,
    handlers: RwLock<Vec<Arc<Handler>>>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("propagate", &self.propagate())
            .field("disabled", &self.is_disabled())
            .field("handlers", &self.handler_count())
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// An enabled, propagating logger with no level, filters or handlers.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: RwLock::new(None),
            propagate: AtomicBool::new(true),
            disabled: AtomicBool::new(false),
            filters: RwLock::new(Vec::new()),
            handlers: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn builder(name: impl Into<String>) -> LoggerBuilder {
        LoggerBuilder::new(name)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` means the level is inherited (`NOTSET`).
    #[must_use]
    pub fn level(&self) -> Option<Level> {
        *self.level.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_level(&self, level: Option<Level>) {
        *self.level.write().unwrap_or_else(PoisonError::into_inner) = level;
    }

    #[must_use]
    pub fn propagate(&self) -> bool {
        self.propagate.load(Ordering::Acquire)
    }

    pub fn set_propagate(&self, propagate: bool) {
        self.propagate.store(propagate, Ordering::Release);
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Release);
    }

    pub fn set_filters(&self, filters: Vec<Arc<dyn Filter>>) {
        *self.filters.write().unwrap_or_else(PoisonError::into_inner) = filters;
    }

    pub fn set_handlers(&self, handlers: Vec<Arc<Handler>>) {
        *self.handlers.write().unwrap_or_else(PoisonError::into_inner) = handlers;
    }

    pub fn add_handler(&self, handler: Arc<Handler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Snapshot of the current handlers; the lock is not held while they run.
    #[must_use]
    pub fn handlers(&self) -> Vec<Arc<Handler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the logger's own filters let `record` through.
    #[must_use]
    pub fn passes_filters(&self, record: &LogRecord) -> bool {
        self.filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .all(|f| f.filter(record))
    }

    /// Whether a record at `level` would be created by `log`.
    #[must_use]
    pub fn is_enabled_for(&self, level: Level) -> bool {
        !self.is_disabled() && self.level().is_none_or(|min| level >= min)
    }

    /// Runs the record through this logger's own handlers only.
    ///
    /// Returns how many handlers emitted it.
    ///
    /// # Errors
    /// The first error from a handler configured to raise.
    pub fn call_handlers(&self, record: &LogRecord) -> Result<usize, crate::Error> {
        let mut emitted = 0;
        for handler in self.handlers() {
            if handler.handle(record)? {
                emitted += 1;
            }
        }
        Ok(emitted)
    }

    /// Creates a record and hands it to this logger's handlers, without any
    /// hierarchy walk. Used for standalone loggers such as the diagnostic one.
    pub fn log(&self, level: Level, msg: &str) {
        if self.is_enabled_for(level) {
            self.emit(&LogRecord::new(self.name.clone(), level, msg));
        }
    }

    /// Level gate, own filters, then own handlers; handler errors are dropped.
    pub fn emit(&self, record: &LogRecord) {
        if self.is_enabled_for(record.level) && self.passes_filters(record) {
            let _ = self.call_handlers(record);
        }
    }

    /// # Errors
    /// The first error from a handler configured to raise.
    pub fn flush(&self) -> Result<(), crate::Error> {
        for handler in self.handlers() {
            handler.flush()?;
        }
        Ok(())
    }
}
