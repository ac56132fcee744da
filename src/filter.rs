//! Record filters attachable to loggers and handlers.

use crate::level::Level;
use crate::record::LogRecord;

/// Decides whether a record continues down a logger or handler chain.
pub trait Filter: Send + Sync {
    fn filter(&self, record: &LogRecord) -> bool;
}

impl<F> Filter for F
where
    F: Fn(&LogRecord) -> bool + Send + Sync,
{
    fn filter(&self, record: &LogRecord) -> bool {
        self(record)
    }
}

/// Passes records from the named logger and its descendants.
///
/// An empty name passes everything.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    name: String,
}

impl NameFilter {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Filter for NameFilter {
    fn filter(&self, record: &LogRecord) -> bool {
        if self.name.is_empty() || record.name == self.name {
            return true;
        }
        record
            .name
            .strip_prefix(self.name.as_str())
            .is_some_and(|rest| rest.starts_with('.'))
    }
}

/// Passes records at or *below* a ceiling level.
///
/// Pairs with a handler level to route a band of severities, e.g. INFO..=WARNING
/// to stdout while ERROR and above go elsewhere. A `None` ceiling passes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReverseLevelFilter {
    ceiling: Option<Level>,
}

impl ReverseLevelFilter {
    #[must_use]
    pub const fn new(ceiling: Option<Level>) -> Self {
        Self { ceiling }
    }
}

impl Filter for ReverseLevelFilter {
    fn filter(&self, record: &LogRecord) -> bool {
        self.ceiling.is_some_and(|ceiling| record.level <= ceiling)
    }
}

/// Passes records whose `extra` carries a non-null value under `attr`.
///
/// The SMTP sink uses this with `"email"` so only records addressed for mail
/// reach it.
#[derive(Debug, Clone)]
pub struct AttributeFilter {
    attr: String,
}

impl AttributeFilter {
    #[must_use]
    pub fn new(attr: impl Into<String>) -> Self {
        Self { attr: attr.into() }
    }

    #[must_use]
    pub fn attr(&self) -> &str {
        &self.attr
    }
}

impl Filter for AttributeFilter {
    fn filter(&self, record: &LogRecord) -> bool {
        record.attr(&self.attr).is_some_and(|v| !v.is_null())
    }
}
