//! Unified error type for all relaylog operations.

use crate::daemon::DaemonError;
use std::path::PathBuf;

/// Error type for relaylog operations.
#[derive(Debug)]
pub enum Error {
    /// I/O error.
    Io(std::io::Error),
    /// JSON encode/decode error (envelopes, dict-config payloads, database documents).
    Json(serde_json::Error),
    /// TOML config parsing error.
    ConfigParse(toml::de::Error),
    /// Config directory not found.
    ConfigDirNotFound,
    /// A dict-config directive could not be applied.
    Config(String),
    /// Invalid log level string.
    InvalidLevel(String),
    /// Invalid path.
    InvalidPath(String),
    /// The shared queue refused a message under the `Error` overflow policy.
    QueueFull,
    /// An encoded message exceeds the frame size the queue accepts.
    MessageTooLarge { size: usize, limit: usize },
    /// An envelope carried neither a record nor a config directive.
    EmptyEnvelope,
    /// SMTP conversation failed (unexpected reply code or protocol error).
    Smtp(String),
    /// TLS setup or handshake failed.
    Tls(String),
    /// A database collection cannot accept writes.
    NotWritable(PathBuf),
    /// Lifecycle misuse or process control failure.
    Daemon(DaemonError),
    /// OS-level call failed (signals, wait, fork).
    Os(nix::errno::Errno),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
            Self::ConfigParse(e) => write!(f, "parse error: {e}"),
            Self::ConfigDirNotFound => write!(f, "config directory not found"),
            Self::Config(msg) => write!(f, "invalid logging config: {msg}"),
            Self::InvalidLevel(level) => write!(f, "invalid level: {level}"),
            Self::InvalidPath(s) => write!(f, "invalid path: {s}"),
            Self::QueueFull => write!(f, "shared queue is full"),
            Self::MessageTooLarge { size, limit } => {
                write!(f, "message of {size} bytes exceeds queue limit of {limit} bytes")
            }
            Self::EmptyEnvelope => write!(f, "envelope carries neither record nor config"),
            Self::Smtp(msg) => write!(f, "SMTP error: {msg}"),
            Self::Tls(msg) => write!(f, "TLS error: {msg}"),
            Self::NotWritable(p) => write!(f, "collection cannot accept writes: {}", p.display()),
            Self::Daemon(e) => write!(f, "{e}"),
            Self::Os(e) => write!(f, "OS error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::ConfigParse(e) => Some(e),
            Self::Daemon(e) => Some(e),
            Self::Os(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::ConfigParse(e)
    }
}

impl From<nix::errno::Errno> for Error {
    fn from(e: nix::errno::Errno) -> Self {
        Self::Os(e)
    }
}

impl From<rustls::Error> for Error {
    fn from(e: rustls::Error) -> Self {
        Self::Tls(e.to_string())
    }
}

impl From<DaemonError> for Error {
    fn from(e: DaemonError) -> Self {
        Self::Daemon(e)
    }
}

/// A batch delivery that failed part-way through.
///
/// `delivered` counts the leading records of the batch that reached the
/// destination before `source` was raised.
#[derive(Debug)]
pub struct DeliveryError {
    pub delivered: usize,
    pub source: Error,
}

impl DeliveryError {
    /// Failure before anything was delivered.
    #[must_use]
    pub const fn none_delivered(source: Error) -> Self {
        Self {
            delivered: 0,
            source,
        }
    }
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "delivery failed after {} record(s): {}",
            self.delivered, self.source
        )
    }
}

impl std::error::Error for DeliveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl From<Error> for DeliveryError {
    fn from(e: Error) -> Self {
        Self::none_delivered(e)
    }
}

impl From<std::io::Error> for DeliveryError {
    fn from(e: std::io::Error) -> Self {
        Self::none_delivered(e.into())
    }
}
