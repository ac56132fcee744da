//! Command-line front end: run a listener, or talk to one through its queue.

pub mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Log level for CLI arguments.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl From<LogLevel> for crate::level::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::Trace,
            LogLevel::Debug => Self::Debug,
            LogLevel::Info => Self::Info,
            LogLevel::Warn => Self::Warn,
            LogLevel::Error => Self::Error,
            LogLevel::Critical => Self::Critical,
        }
    }
}

/// relaylog - multi-process log aggregation.
#[derive(Parser)]
#[command(name = "relaylog", version, about = "Multi-process log aggregation")]
pub struct Cli {
    /// Runtime directory holding the queue socket and stop marker
    #[arg(long, global = true, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Config file (default: ~/.config/relaylog/relaylog.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the listener in the foreground until stopped.
    Listen {
        /// JSON dict-config applied before the first message
        #[arg(long, value_name = "FILE")]
        logging: Option<PathBuf>,
    },
    /// Enqueue one record.
    Send {
        /// Logger name
        logger: String,
        #[arg(value_enum)]
        level: LogLevel,
        message: Vec<String>,
    },
    /// Enqueue a JSON dict-config.
    Configure {
        file: PathBuf,
    },
    /// Change one logger's level on the listener ("notset" inherits).
    SetLevel {
        logger: String,
        level: String,
    },
    /// Ask a running listener to stop.
    Stop,
}

impl Cli {
    /// Loads the config the flags point at, with `--dir` overriding the runtime dir.
    ///
    /// # Errors
    /// The config file cannot be read or parsed.
    pub fn load_config(&self) -> Result<Config, crate::Error> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        if let Some(dir) = &self.dir {
            config.listener.runtime_dir = Some(dir.to_string_lossy().into_owned());
        }
        Ok(config)
    }
}

pub use commands::{cmd_configure, cmd_listen, cmd_send, cmd_set_level, cmd_stop};
