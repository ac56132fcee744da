//! Line-oriented output to a standard stream or any writer.

use super::Sink;
use crate::fmt::Formatter;
use crate::record::LogRecord;
use std::io::{self, Write};
use std::sync::Mutex;

/// Where a `StreamSink` writes.
pub enum StreamTarget {
    Stderr,
    Stdout,
    /// Arbitrary writer, e.g. an in-memory buffer in tests.
    Writer(Mutex<Box<dyn Write + Send>>),
}

impl StreamTarget {
    /// Accepts the `stream` argument of the stream handler class.
    ///
    /// # Errors
    /// Returns `Error::Config` for anything but stderr/stdout.
    pub fn parse(name: &str) -> Result<Self, crate::Error> {
        match name.trim().to_lowercase().as_str() {
            "stderr" | "ext://sys.stderr" => Ok(Self::Stderr),
            "stdout" | "ext://sys.stdout" => Ok(Self::Stdout),
            other => Err(crate::Error::Config(format!("unknown stream: {other}"))),
        }
    }
}

/// Writes each record followed by a newline and flushes immediately.
pub struct StreamSink {
    target: StreamTarget,
}

impl Default for StreamSink {
    fn default() -> Self {
        Self::stderr()
    }
}

impl StreamSink {
    #[must_use]
    pub const fn new(target: StreamTarget) -> Self {
        Self { target }
    }

    #[must_use]
    pub const fn stderr() -> Self {
        Self::new(StreamTarget::Stderr)
    }

    #[must_use]
    pub const fn stdout() -> Self {
        Self::new(StreamTarget::Stdout)
    }

    #[must_use]
    pub fn writer(writer: impl Write + Send + 'static) -> Self {
        Self::new(StreamTarget::Writer(Mutex::new(Box::new(writer))))
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        match &self.target {
            StreamTarget::Stderr => {
                let mut err = io::stderr().lock();
                writeln!(err, "{line}")?;
                err.flush()
            }
            StreamTarget::Stdout => {
                let mut out = io::stdout().lock();
                writeln!(out, "{line}")?;
                out.flush()
            }
            StreamTarget::Writer(w) => {
                let mut w = w.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                writeln!(w, "{line}")?;
                w.flush()
            }
        }
    }
}

impl Sink for StreamSink {
    fn emit(&self, record: &LogRecord, formatter: &Formatter) -> Result<(), crate::Error> {
        self.write_line(&formatter.format(record))?;
        Ok(())
    }

    fn flush(&self) -> Result<(), crate::Error> {
        match &self.target {
            StreamTarget::Stderr => io::stderr().flush()?,
            StreamTarget::Stdout => io::stdout().flush()?,
            StreamTarget::Writer(w) => w
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .flush()?,
        }
        Ok(())
    }
}
