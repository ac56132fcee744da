//! Typed, nested logger descriptions that flatten into a `DictConfig`.
//!
//! A `LoggerSpec` owns its handlers, which own their formatter and filters;
//! `to_dict_config` assigns generated names and produces the flat,
//! name-referenced mapping the registry consumes.

use super::{DictConfig, FilterConfig, FormatterConfig, HandlerConfig, LoggerConfig};
use crate::level::Level;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatterSpec {
    pub format: String,
    pub datefmt: Option<String>,
    pub style: Option<String>,
}

impl FormatterSpec {
    #[must_use]
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn datefmt(mut self, datefmt: impl Into<String>) -> Self {
        self.datefmt = Some(datefmt.into());
        self
    }
}

impl From<&FormatterSpec> for FormatterConfig {
    fn from(spec: &FormatterSpec) -> Self {
        Self {
            format: Some(spec.format.clone()),
            datefmt: spec.datefmt.clone(),
            style: spec.style.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    /// `None` means a name filter.
    pub class: Option<String>,
    pub args: Map<String, Value>,
}

impl FilterSpec {
    #[must_use]
    pub fn name(logger: impl Into<String>) -> Self {
        let mut args = Map::new();
        args.insert("name".into(), Value::String(logger.into()));
        Self { class: None, args }
    }

    #[must_use]
    pub fn reverse(ceiling: Level) -> Self {
        let mut args = Map::new();
        args.insert("level".into(), Value::String(ceiling.name().into()));
        Self {
            class: Some("reverse".into()),
            args,
        }
    }

    #[must_use]
    pub fn attribute(attr: impl Into<String>) -> Self {
        let mut args = Map::new();
        args.insert("attr_name".into(), Value::String(attr.into()));
        Self {
            class: Some("attribute".into()),
            args,
        }
    }
}

impl From<&FilterSpec> for FilterConfig {
    fn from(spec: &FilterSpec) -> Self {
        Self {
            class: spec.class.clone(),
            args: spec.args.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandlerSpec {
    pub class: String,
    pub level: Option<Level>,
    pub formatter: Option<FormatterSpec>,
    pub filters: Vec<FilterSpec>,
    /// Class-specific constructor arguments.
    pub args: Map<String, Value>,
}

impl HandlerSpec {
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
    pub fn formatter(mut self, formatter: FormatterSpec) -> Self {
        self.formatter = Some(formatter);
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggerSpec {
    /// Dotted logger name; empty or `"root"` targets the root logger.
    pub name: String,
    pub level: Option<Level>,
    pub propagate: bool,
    pub filters: Vec<FilterSpec>,
    pub handlers: Vec<HandlerSpec>,
}

impl LoggerSpec {
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
    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn handler(mut self, handler: HandlerSpec) -> Self {
        self.handlers.push(handler);
        self
    }

    fn is_root(&self) -> bool {
        self.name.is_empty() || self.name == "root"
    }

    /// Flattens this logger into a dict-config of its own.
    #[must_use]
    pub fn to_dict_config(&self, disable_existing_loggers: bool) -> DictConfig {
        to_dict_config(std::slice::from_ref(self), disable_existing_loggers)
    }

    fn write_into(&self, config: &mut DictConfig) {
        let prefix = if self.is_root() { "root" } else { &self.name };
        let mut logger = LoggerConfig {
            level: self.level,
            propagate: (!self.is_root()).then_some(self.propagate),
            filters: Vec::new(),
            handlers: Vec::new(),
        };

        for (j, filter) in self.filters.iter().enumerate() {
            let name = format!("{prefix}.filter{j}");
            config.filters.insert(name.clone(), filter.into());
            logger.filters.push(name);
        }

        for (i, spec) in self.handlers.iter().enumerate() {
            let handler_name = format!("{prefix}.handler{i}");
            let mut handler = HandlerConfig {
                class: spec.class.clone(),
                level: spec.level,
                formatter: None,
                filters: Vec::new(),
                args: spec.args.clone(),
            };
            if let Some(formatter) = &spec.formatter {
                let name = format!("{handler_name}.formatter");
                config.formatters.insert(name.clone(), formatter.into());
                handler.formatter = Some(name);
            }
            for (j, filter) in spec.filters.iter().enumerate() {
                let name = format!("{handler_name}.filter{j}");
                config.filters.insert(name.clone(), filter.into());
                handler.filters.push(name);
            }
            config.handlers.insert(handler_name.clone(), handler);
            logger.handlers.push(handler_name);
        }

        if self.is_root() {
            config.root = Some(logger);
        } else {
            config.loggers.insert(self.name.clone(), logger);
        }
    }
}

/// Flattens several loggers into one dict-config.
#[must_use]
pub fn to_dict_config(loggers: &[LoggerSpec], disable_existing_loggers: bool) -> DictConfig {
    let mut config = DictConfig::default().disable_existing_loggers(disable_existing_loggers);
    for logger in loggers {
        logger.write_into(&mut config);
    }
    config
}
