//! Relaylog's own diagnostic logger: the fallback channel for failures that
//! must never reach a producer's caller.
//!
//! The logger lives in a `OnceLock`. The first diagnostic installs a stderr
//! logger at `warn`, so nothing reported before `init_with_config` is lost.

use crate::config::Config;
use crate::fmt::Formatter;
use crate::level::Level;
use crate::logger::Logger;
use crate::record::LogRecord;
use crate::sink::{Handler, Sink, StreamSink, StreamTarget, TimedRotatingFileSink};
use std::cell::Cell;
use std::sync::{Arc, OnceLock};

const FORMAT: &str = "%(asctime)s %(levelname)-8s %(scope)-10s %(message)s";

static INTERNAL_LOGGER: OnceLock<Logger> = OnceLock::new();

thread_local! {
    // A failing diagnostic sink reports through this logger again.
    static REPORTING: Cell<bool> = const { Cell::new(false) };
}

fn logger() -> &'static Logger {
    INTERNAL_LOGGER.get_or_init(|| {
        Logger::builder("relaylog")
            .level(Level::Warn)
            .stream(StreamTarget::Stderr)
            .format(FORMAT)
            .done()
            .build()
    })
}

fn diagnostic_handler(sink: impl Sink + 'static) -> Arc<Handler> {
    Arc::new(Handler::new(sink).formatter(Formatter::new(FORMAT)))
}

/// Applies the `[internal]` section: level and an optional extra log file.
///
/// Safe to call more than once; the latest config wins.
pub fn init_with_config(config: &Config) {
    let logger = logger();
    logger.set_level(Some(config.internal_level()));

    let mut handlers = vec![diagnostic_handler(StreamSink::stderr())];
    let mut file_error = None;
    if let Some(file) = config.internal.file.as_deref() {
        match TimedRotatingFileSink::new(file) {
            Ok(sink) => handlers.push(diagnostic_handler(sink)),
            Err(e) => file_error = Some(format!("Cannot open diagnostic file {file}: {e}")),
        }
    }
    logger.set_handlers(handlers);

    if let Some(msg) = file_error {
        warn("INTERNAL", &msg);
    }
    debug(
        "INTERNAL",
        &format!("Diagnostics at {}", config.internal_level()),
    );
}

/// Current diagnostic threshold.
#[must_use]
pub fn level() -> Option<Level> {
    logger().level()
}

fn log(level: Level, scope: &str, msg: &str) {
    let logger = logger();
    if !logger.is_enabled_for(level) || REPORTING.with(Cell::get) {
        return;
    }
    REPORTING.with(|r| r.set(true));
    let record = LogRecord::new("relaylog", level, msg).with_extra("scope", scope);
    logger.emit(&record);
    REPORTING.with(|r| r.set(false));
}

pub fn trace(scope: &str, msg: &str) {
    log(Level::Trace, scope, msg);
}

pub fn debug(scope: &str, msg: &str) {
    log(Level::Debug, scope, msg);
}

pub fn info(scope: &str, msg: &str) {
    log(Level::Info, scope, msg);
}

pub fn warn(scope: &str, msg: &str) {
    log(Level::Warn, scope, msg);
}

/// Failures that were swallowed to keep the pipeline running.
pub fn error(scope: &str, msg: &str) {
    log(Level::Error, scope, msg);
}
