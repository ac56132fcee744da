//! `relaylog` - multi-process log aggregation.
//!
//! Producer processes put log records and configuration directives on a
//! shared queue; one listener process pulls them off and dispatches each to
//! the handler chain of the named logger:
//!
//! - `Producer` / `QueueSink`: serialize a record into an `Envelope` and enqueue it
//! - `QueueListener` + `Dispatcher`: dequeue, apply config, route records
//! - `ListenerDaemon`: fork, stop (graceful or forced) and refresh the listener
//! - `Registry`: logger hierarchy rebuilt from dict-config directives
//! - `BatchingSink`: buffered delivery behind the SMTP and database handlers
//!
//! # Example
//!
//! ```no_run
//! use relaylog::{Envelope, Level, LogContext, LogRecord, QueueListener, Registry};
//! use std::sync::Arc;
//!
//! let context = LogContext::init("/tmp/relaylog-demo")?;
//! let listener = QueueListener::for_context(&context, Arc::new(Registry::new()));
//! let handle = listener.spawn()?;
//!
//! let producer = context.producer("app");
//! producer.info("hello");
//! context.send(&Envelope::record(LogRecord::new("app", Level::Warn, "direct")))?;
//!
//! handle.join();
//! # Ok::<(), relaylog::Error>(())
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `relaylog` binary

pub mod config;
pub mod context;
pub mod daemon;
pub mod dictconfig;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod fmt;
pub mod internal;
pub mod level;
pub mod listener;
pub mod logger;
pub mod mail;
pub mod producer;
pub mod queue;
pub mod record;
pub mod registry;
pub mod sink;
pub mod stop;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::Config;
pub use context::LogContext;
pub use daemon::{DaemonError, ListenerDaemon, StopTimeout};
pub use dictconfig::{DictConfig, FilterSpec, FormatterSpec, HandlerSpec, LoggerSpec};
pub use envelope::{ConfigDirective, Envelope};
pub use error::{DeliveryError, Error};
pub use filter::{AttributeFilter, Filter, NameFilter, ReverseLevelFilter};
pub use fmt::Formatter;
pub use level::Level;
pub use listener::{Dispatcher, ListenerHandle, MessageHandler, QueueListener};
pub use logger::{Logger, LoggerBuilder};
pub use producer::{MessageTransform, Producer};
pub use queue::{OverflowPolicy, SharedQueue};
pub use record::{LogRecord, SourceLocation};
pub use registry::Registry;
pub use sink::{BatchingSink, ClearPolicy, Deliver, Handler, Sink};
pub use stop::StopEvent;
