//! The unit of transport between producers and the listener.

use crate::dictconfig::DictConfig;
use crate::level::Level;
use crate::record::LogRecord;
use serde::{Deserialize, Serialize};

/// A configuration change shipped through the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigDirective {
    /// Full dict-config payload.
    Dict(DictConfig),
    /// Sets one logger's level; `None` resets it to inherit.
    SetLevel {
        logger: String,
        #[serde(
            default,
            deserialize_with = "crate::level::deserialize_optional",
            skip_serializing_if = "Option::is_none"
        )]
        level: Option<Level>,
    },
}

impl From<DictConfig> for ConfigDirective {
    fn from(config: DictConfig) -> Self {
        Self::Dict(config)
    }
}

/// Carries a record, a config directive, or both.
///
/// When both are present the listener applies `config` before handling `record`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub record: Option<LogRecord>,
    #[serde(default)]
    pub config: Option<ConfigDirective>,
}

impl Envelope {
    #[must_use]
    pub const fn record(record: LogRecord) -> Self {
        Self {
            record: Some(record),
            config: None,
        }
    }

    #[must_use]
    pub const fn config(config: ConfigDirective) -> Self {
        Self {
            record: None,
            config: Some(config),
        }
    }

    #[must_use]
    pub const fn both(config: ConfigDirective, record: LogRecord) -> Self {
        Self {
            record: Some(record),
            config: Some(config),
        }
    }

    /// An envelope must carry at least one payload.
    ///
    /// # Errors
    /// Returns `Error::EmptyEnvelope` when both fields are `None`.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.record.is_none() && self.config.is_none() {
            return Err(crate::Error::EmptyEnvelope);
        }
        Ok(())
    }
}
