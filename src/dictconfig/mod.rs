//! The declarative logging-configuration payload shipped in config directives.
//!
//! The schema mirrors the conventional `version`/`formatters`/`filters`/
//! `handlers`/`loggers`/`root` mapping so configs written for other tooling
//! can be sent unchanged. Handler constructor arguments are kept as raw JSON
//! and interpreted by the handler class factory.

mod factory;
mod spec;

pub use factory::{
    FactoryArgs, FilterFactory, HandlerFactory, builtin_filter_classes, builtin_handler_classes,
};
pub use spec::{FilterSpec, FormatterSpec, HandlerSpec, LoggerSpec, to_dict_config};

use crate::fmt::{FormatStyle, Formatter};
use crate::level::Level;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// The only schema version understood.
pub const SCHEMA_VERSION: u32 = 1;

const fn default_true() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

/// Top-level dict-config mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictConfig {
    pub version: u32,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub disable_existing_loggers: bool,
    /// Only levels and `propagate` are applied; handlers are left alone.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub incremental: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub formatters: BTreeMap<String, FormatterConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, FilterConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub handlers: BTreeMap<String, HandlerConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub loggers: BTreeMap<String, LoggerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<LoggerConfig>,
}

impl Default for DictConfig {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            disable_existing_loggers: true,
            incremental: false,
            formatters: BTreeMap::new(),
            filters: BTreeMap::new(),
            handlers: BTreeMap::new(),
            loggers: BTreeMap::new(),
            root: None,
        }
    }
}

impl DictConfig {
    /// # Errors
    /// Invalid JSON or an unsupported `version`.
    pub fn from_json(json: &str) -> Result<Self, crate::Error> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Unreadable file, invalid JSON or an unsupported `version`.
    pub fn from_file(path: &Path) -> Result<Self, crate::Error> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// # Errors
    /// `Error::Config` when `version` is not 1.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.version != SCHEMA_VERSION {
            return Err(crate::Error::Config(format!(
                "unsupported version: {}",
                self.version
            )));
        }
        Ok(())
    }

    /// Config that only sets levels, leaving handlers untouched.
    #[must_use]
    pub fn incremental() -> Self {
        Self {
            incremental: true,
            disable_existing_loggers: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn logger(mut self, name: impl Into<String>, config: LoggerConfig) -> Self {
        self.loggers.insert(name.into(), config);
        self
    }

    #[must_use]
    pub fn handler(mut self, name: impl Into<String>, config: HandlerConfig) -> Self {
        self.handlers.insert(name.into(), config);
        self
    }

    #[must_use]
    pub fn formatter(mut self, name: impl Into<String>, config: FormatterConfig) -> Self {
        self.formatters.insert(name.into(), config);
        self
    }

    #[must_use]
    pub fn filter(mut self, name: impl Into<String>, config: FilterConfig) -> Self {
        self.filters.insert(name.into(), config);
        self
    }

    #[must_use]
    pub fn root(mut self, config: LoggerConfig) -> Self {
        self.root = Some(config);
        self
    }

    #[must_use]
    pub const fn disable_existing_loggers(mut self, disable: bool) -> Self {
        self.disable_existing_loggers = disable;
        self
    }
}

/// `formatters` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datefmt: Option<String>,
    /// `%` (default) or `{`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl FormatterConfig {
    #[must_use]
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: Some(format.into()),
            ..Self::default()
        }
    }

    /// # Errors
    /// Unknown `style` marker.
    pub fn build(&self) -> Result<Formatter, crate::Error> {
        let style = match self.style.as_deref() {
            None => FormatStyle::Percent,
            Some(marker) => FormatStyle::from_marker(marker)
                .ok_or_else(|| crate::Error::Config(format!("unsupported style: {marker}")))?,
        };
        let formatter = Formatter::with_style(self.format.as_deref().unwrap_or("%(message)s"), style);
        Ok(match &self.datefmt {
            Some(datefmt) => formatter.datefmt(datefmt.clone()),
            None => formatter,
        })
    }
}

/// `filters` entry. Without a class the entry is a name filter (`name` key).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default, alias = "()", skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(flatten)]
    pub args: Map<String, Value>,
}

impl FilterConfig {
    #[must_use]
    pub fn class(class: impl Into<String>) -> Self {
        Self {
            class: Some(class.into()),
            args: Map::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// `handlers` entry. Keys other than the four below are constructor arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerConfig {
    pub class: String,
    #[serde(
        default,
        deserialize_with = "crate::level::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub level: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,
    #[serde(flatten)]
    pub args: Map<String, Value>,
}

impl HandlerConfig {
    #[must_use]
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            level: None,
            formatter: None,
            filters: Vec::new(),
            args: Map::new(),
        }
    }

    #[must_use]
    pub const fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub fn formatter(mut self, name: impl Into<String>) -> Self {
        self.formatter = Some(name.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, name: impl Into<String>) -> Self {
        self.filters.push(name.into());
        self
    }

    #[must_use]
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// `loggers` entry (also the shape of `root`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(
        default,
        deserialize_with = "crate::level::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub level: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagate: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub handlers: Vec<String>,
}

impl LoggerConfig {
    #[must_use]
    pub const fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub const fn propagate(mut self, propagate: bool) -> Self {
        self.propagate = Some(propagate);
        self
    }

    #[must_use]
    pub fn handler(mut self, name: impl Into<String>) -> Self {
        self.handlers.push(name.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, name: impl Into<String>) -> Self {
        self.filters.push(name.into());
        self
    }
}
