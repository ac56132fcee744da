//! TOML configuration for the pipeline itself: where the runtime files live,
//! how the queue behaves under pressure, and how loud relaylog's own
//! diagnostics are. Logger/handler layout is not configured here; it travels
//! as dict-config directives.

mod structs;

pub use structs::{InternalConfig, ListenerConfig, QueueConfig};

use crate::context::default_runtime_dir;
use crate::dictconfig::DictConfig;
use crate::internal;
use crate::level::Level;
use crate::queue::OverflowPolicy;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// An empty or missing file yields a fully working default configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub listener: ListenerConfig,
    pub queue: QueueConfig,
    pub internal: InternalConfig,
}

impl Config {
    /// Loads `~/.config/relaylog/relaylog.toml`, or defaults when absent.
    ///
    /// # Errors
    /// The config directory cannot be determined or the TOML is invalid.
    pub fn load() -> Result<Self, crate::Error> {
        let path = Self::get_config_path()?;
        Self::load_from(&path)
    }

    /// Loads from an explicit path; a missing file yields defaults.
    ///
    /// # Errors
    /// The file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, crate::Error> {
        if !path.exists() {
            internal::debug("CONFIG", "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        internal::debug("CONFIG", &format!("Config loaded from {}", path.display()));
        Ok(config)
    }

    /// # Errors
    /// No home/config directory can be determined.
    pub fn get_config_path() -> Result<PathBuf, crate::Error> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("relaylog").join("relaylog.toml"))
            .ok_or(crate::Error::ConfigDirNotFound)
    }

    /// Configured runtime directory with `~` expanded, or the platform default.
    #[must_use]
    pub fn runtime_dir(&self) -> PathBuf {
        self.listener
            .runtime_dir
            .as_deref()
            .map_or_else(default_runtime_dir, |dir| {
                PathBuf::from(shellexpand::tilde(dir).as_ref())
            })
    }

    /// # Errors
    /// Unknown policy names.
    pub fn overflow_policy(&self) -> Result<OverflowPolicy, crate::Error> {
        match self.queue.overflow.trim().to_lowercase().as_str() {
            "error" => Ok(OverflowPolicy::Error),
            "drop" => Ok(OverflowPolicy::Drop),
            "block" => Ok(OverflowPolicy::Block {
                timeout: Some(self.queue.block_timeout_ms)
                    .filter(|ms| *ms > 0)
                    .map(Duration::from_millis),
            }),
            other => Err(crate::Error::Config(format!("unknown overflow policy: {other}"))),
        }
    }

    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        Duration::from_millis(self.listener.grace_period_ms)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.listener.poll_interval_ms)
    }

    /// Falls back to `warn` on unknown names.
    #[must_use]
    pub fn internal_level(&self) -> Level {
        self.internal.level.parse().unwrap_or(Level::Warn)
    }

    /// Reads the JSON dict-config named by `listener.logging`, if any.
    ///
    /// # Errors
    /// The file cannot be read or is not a valid dict-config.
    pub fn logging_config(&self) -> Result<Option<DictConfig>, crate::Error> {
        let Some(path) = self.listener.logging.as_deref() else {
            return Ok(None);
        };
        DictConfig::from_file(Path::new(shellexpand::tilde(path).as_ref())).map(Some)
    }
}
