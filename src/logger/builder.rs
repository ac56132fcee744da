//! Stepwise construction of a standalone `Logger` with its handlers.

use super::Logger;
use crate::filter::Filter;
use crate::fmt::Formatter;
use crate::level::Level;
use crate::sink::{Handler, Rotation, Sink, StreamSink, StreamTarget, TimedRotatingFileSink};
use std::sync::Arc;

pub struct LoggerBuilder {
    name: String,
    level: Option<Level>,
    propagate: bool,
    filters: Vec<Arc<dyn Filter>>,
    handlers: Vec<Arc<Handler>>,
}

impl LoggerBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: None,
            propagate: true,
            filters: Vec::new(),
            handlers: Vec::new(),
        }
    }

    #[must_use]
    pub const fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub const fn propagate(mut self, propagate: bool) -> Self {
        self.propagate = propagate;
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    #[must_use]
    pub fn handler(mut self, handler: Handler) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Shorthand for a handler with default settings around `sink`.
    #[must_use]
    pub fn sink(self, sink: impl Sink + 'static) -> Self {
        self.handler(Handler::new(sink))
    }

    #[must_use]
    pub fn stream(self, target: StreamTarget) -> StreamBuilder {
        StreamBuilder {
            parent: self,
            sink: StreamSink::new(target),
            level: None,
            formatter: Formatter::default(),
        }
    }

    #[must_use]
    pub fn file(self, path: impl Into<String>) -> FileBuilder {
        FileBuilder {
            parent: self,
            path: path.into(),
            header: None,
            rotation: Rotation::Never,
            backup_count: 0,
            compress: false,
            level: None,
            formatter: Formatter::default(),
        }
    }

    #[must_use]
    pub fn build(self) -> Logger {
        let logger = Logger::new(self.name);
        logger.set_level(self.level);
        logger.set_propagate(self.propagate);
        logger.set_filters(self.filters);
        logger.set_handlers(self.handlers);
        logger
    }
}

pub struct StreamBuilder {
    parent: LoggerBuilder,
    sink: StreamSink,
    level: Option<Level>,
    formatter: Formatter,
}

impl StreamBuilder {
    #[must_use]
    pub const fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub fn format(mut self, format: &str) -> Self {
        self.formatter = Formatter::new(format);
        self
    }

    #[must_use]
    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    #[must_use]
    pub fn done(self) -> LoggerBuilder {
        let handler = Handler::new(self.sink)
            .name("stream")
            .level(self.level)
            .formatter(self.formatter);
        self.parent.handler(handler)
    }
}

pub struct FileBuilder {
    parent: LoggerBuilder,
    path: String,
    header: Option<String>,
    rotation: Rotation,
    backup_count: usize,
    compress: bool,
    level: Option<Level>,
    formatter: Formatter,
}

impl FileBuilder {
    #[must_use]
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    #[must_use]
    pub const fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    #[must_use]
    pub const fn backup_count(mut self, count: usize) -> Self {
        self.backup_count = count;
        self
    }

    #[must_use]
    pub const fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    #[must_use]
    pub const fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub fn format(mut self, format: &str) -> Self {
        self.formatter = Formatter::new(format);
        self
    }

    /// Opening the sink touches the filesystem, so unlike the stream builder
    /// this step can fail.
    ///
    /// # Errors
    /// The parent directory cannot be created.
    pub fn done(self) -> Result<LoggerBuilder, crate::Error> {
        let mut sink = TimedRotatingFileSink::new(&self.path)?
            .rotation(self.rotation)
            .backup_count(self.backup_count)
            .compress(self.compress);
        if let Some(header) = self.header {
            sink = sink.header(header);
        }
        let handler = Handler::new(sink)
            .name("file")
            .level(self.level)
            .formatter(self.formatter);
        Ok(self.parent.handler(handler))
    }
}
