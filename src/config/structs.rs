//! Configuration struct definitions.

use serde::Deserialize;

/// `[listener]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Directory holding the queue socket and stop marker.
    pub runtime_dir: Option<String>,
    /// Lifecycle misuse and handler failures raise instead of warning.
    pub raise_on_exc: bool,
    /// Time between SIGTERM and SIGKILL when stopping the daemon.
    pub grace_period_ms: u64,
    /// Stop-event poll interval of the coordination loop.
    pub poll_interval_ms: u64,
    /// JSON dict-config applied when the listener starts.
    pub logging: Option<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            runtime_dir: None,
            raise_on_exc: false,
            grace_period_ms: 100,
            poll_interval_ms: 1000,
            logging: None,
        }
    }
}

/// `[queue]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// `error`, `drop` or `block`.
    pub overflow: String,
    /// Upper bound for `block`; `0` blocks indefinitely.
    pub block_timeout_ms: u64,
    /// Largest encoded envelope accepted by `put`.
    pub max_envelope_bytes: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            overflow: "block".to_string(),
            block_timeout_ms: 1000,
            max_envelope_bytes: crate::queue::DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

/// `[internal]` section: relaylog's own diagnostics.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InternalConfig {
    pub level: String,
    /// Also write diagnostics to this file.
    pub file: Option<String>,
}

impl Default for InternalConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}
