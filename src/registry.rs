//! Logger-name → logger mapping on the listener side.
//!
//! Mutated only by config directives; read when routing a record. One mutex
//! covers every update and every lookup, while handlers themselves run
//! outside it so a slow sink does not stall other dispatch workers.

use crate::dictconfig::{
    DictConfig, FactoryArgs, FilterFactory, HandlerFactory, LoggerConfig, builtin_filter_classes,
    builtin_handler_classes,
};
use crate::envelope::ConfigDirective;
use crate::filter::Filter;
use crate::fmt::Formatter;
use crate::internal;
use crate::level::Level;
use crate::logger::Logger;
use crate::record::LogRecord;
use crate::sink::Handler;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const ROOT: &str = "root";

fn is_root(name: &str) -> bool {
    name.is_empty() || name == ROOT
}

/// `a.b` is a descendant of `a`, `a.bc` is not.
fn is_descendant(name: &str, ancestor: &str) -> bool {
    name.strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('.'))
}

struct State {
    root: Arc<Logger>,
    loggers: BTreeMap<String, Arc<Logger>>,
    handlers: BTreeMap<String, Arc<Handler>>,
    applied: BTreeMap<String, LoggerConfig>,
    handler_classes: HashMap<String, HandlerFactory>,
    filter_classes: HashMap<String, FilterFactory>,
}

impl State {
    fn logger(&mut self, name: &str) -> Arc<Logger> {
        if is_root(name) {
            return Arc::clone(&self.root);
        }
        Arc::clone(
            self.loggers
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Logger::new(name))),
        )
    }

    /// `name` itself, then each existing dotted ancestor, then root.
    fn chain(&mut self, name: &str) -> Vec<Arc<Logger>> {
        let mut chain = vec![self.logger(name)];
        if is_root(name) {
            return chain;
        }
        let mut current = name;
        while let Some((parent, _)) = current.rsplit_once('.') {
            if let Some(logger) = self.loggers.get(parent) {
                chain.push(Arc::clone(logger));
            }
            current = parent;
        }
        chain.push(Arc::clone(&self.root));
        chain
    }
}

/// Everything one non-incremental config needs, built before any mutation.
struct Built {
    handlers: BTreeMap<String, Arc<Handler>>,
    filters: BTreeMap<String, Arc<dyn Filter>>,
}

pub struct Registry {
    state: Mutex<State>,
    raise_errors: bool,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Registry")
            .field("loggers", &state.loggers.keys().collect::<Vec<_>>())
            .field("handlers", &state.handlers.keys().collect::<Vec<_>>())
            .field("raise_errors", &self.raise_errors)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// An empty registry with the built-in handler and filter classes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                root: Arc::new(Logger::new(ROOT)),
                loggers: BTreeMap::new(),
                handlers: BTreeMap::new(),
                applied: BTreeMap::new(),
                handler_classes: builtin_handler_classes(),
                filter_classes: builtin_filter_classes(),
            }),
            raise_errors: false,
        }
    }

    /// Handlers built from now on propagate delivery errors.
    #[must_use]
    pub const fn raise_errors(mut self, raise: bool) -> Self {
        self.raise_errors = raise;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_handler_class(&self, class: impl Into<String>, factory: HandlerFactory) {
        self.lock().handler_classes.insert(class.into(), factory);
    }

    pub fn register_filter_class(&self, class: impl Into<String>, factory: FilterFactory) {
        self.lock().filter_classes.insert(class.into(), factory);
    }

    /// Gets or creates the logger; `""` and `"root"` name the root logger.
    #[must_use]
    pub fn logger(&self, name: &str) -> Arc<Logger> {
        self.lock().logger(name)
    }

    #[must_use]
    pub fn root(&self) -> Arc<Logger> {
        Arc::clone(&self.lock().root)
    }

    /// Looks up an existing logger without creating it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Logger>> {
        let state = self.lock();
        if is_root(name) {
            return Some(Arc::clone(&state.root));
        }
        state.loggers.get(name).cloned()
    }

    #[must_use]
    pub fn logger_names(&self) -> Vec<String> {
        self.lock().loggers.keys().cloned().collect()
    }

    #[must_use]
    pub fn handler(&self, name: &str) -> Option<Arc<Handler>> {
        self.lock().handlers.get(name).cloned()
    }

    /// The logger entry as last set by a directive.
    #[must_use]
    pub fn applied_config(&self, name: &str) -> Option<LoggerConfig> {
        let key = if is_root(name) { ROOT } else { name };
        self.lock().applied.get(key).cloned()
    }

    /// # Errors
    /// Anything `apply` or `set_level` rejects.
    pub fn apply_directive(&self, directive: &ConfigDirective) -> Result<(), crate::Error> {
        match directive {
            ConfigDirective::Dict(config) => self.apply(config),
            ConfigDirective::SetLevel { logger, level } => {
                self.set_level(logger, *level);
                Ok(())
            }
        }
    }

    pub fn set_level(&self, name: &str, level: Option<Level>) {
        let mut state = self.lock();
        state.logger(name).set_level(level);
        let key = if is_root(name) { ROOT } else { name };
        state.applied.entry(key.to_string()).or_default().level = level;
        internal::debug(
            "REGISTRY",
            &format!(
                "Level of '{key}' set to {}",
                level.map_or("NOTSET", Level::name)
            ),
        );
    }

    /// Applies a dict-config.
    ///
    /// Formatters, filters and handlers are all built first; if any of them
    /// fails the registry is left exactly as it was.
    ///
    /// # Errors
    /// Unsupported version, unknown class, bad constructor arguments, or a
    /// reference to an undefined formatter, filter or handler.
    pub fn apply(&self, config: &DictConfig) -> Result<(), crate::Error> {
        config.validate()?;
        if config.incremental {
            self.apply_incremental(config);
            return Ok(());
        }

        let mut state = self.lock();
        let Built { handlers, filters } = self.build(&state, config)?;

        // Every reference was resolved in `build`; nothing below can fail.
        let mut configured = Vec::new();
        for (name, cfg) in config.root.iter().map(|c| (ROOT, c)).chain(
            config.loggers.iter().map(|(n, c)| (n.as_str(), c)),
        ) {
            let chain: Vec<_> = cfg
                .handlers
                .iter()
                .filter_map(|h| handlers.get(h).cloned())
                .collect();
            let own_filters: Vec<_> = cfg
                .filters
                .iter()
                .filter_map(|f| filters.get(f).cloned())
                .collect();
            configured.push((state.logger(name), cfg, chain, own_filters));
        }

        let old = std::mem::replace(&mut state.handlers, handlers);
        for (name, handler) in old {
            if let Err(e) = handler.close() {
                internal::warn("REGISTRY", &format!("Closing handler '{name}' failed: {e}"));
            }
        }

        for (logger, cfg, chain, own_filters) in configured {
            logger.set_level(cfg.level);
            logger.set_propagate(cfg.propagate.unwrap_or(true));
            logger.set_filters(own_filters);
            logger.set_handlers(chain);
            logger.set_disabled(false);
        }

        if config.root.is_none() {
            state.root.set_handlers(Vec::new());
        }
        let named: Vec<&String> = config.loggers.keys().filter(|n| !is_root(n)).collect();
        for (name, logger) in &state.loggers {
            if named.iter().any(|n| *n == name) {
                continue;
            }
            logger.set_handlers(Vec::new());
            if named.iter().any(|n| is_descendant(name, n)) {
                logger.set_level(None);
                logger.set_propagate(true);
                logger.set_disabled(false);
            } else {
                logger.set_disabled(config.disable_existing_loggers);
            }
        }

        state.applied.clear();
        if let Some(root) = &config.root {
            state.applied.insert(ROOT.to_string(), root.clone());
        }
        for (name, cfg) in &config.loggers {
            let key = if is_root(name) { ROOT } else { name };
            state.applied.insert(key.to_string(), cfg.clone());
        }

        internal::info(
            "REGISTRY",
            &format!(
                "Applied config: {} handler(s), {} logger(s)",
                state.handlers.len(),
                config.loggers.len()
            ),
        );
        Ok(())
    }

    fn apply_incremental(&self, config: &DictConfig) {
        let mut state = self.lock();
        let entries = config
            .root
            .iter()
            .map(|cfg| (ROOT, cfg))
            .chain(config.loggers.iter().map(|(n, cfg)| (n.as_str(), cfg)));
        let mut changed = Vec::new();
        for (name, cfg) in entries {
            let logger = state.logger(name);
            logger.set_level(cfg.level);
            if let Some(propagate) = cfg.propagate {
                logger.set_propagate(propagate);
            }
            changed.push((if is_root(name) { ROOT } else { name }, cfg));
        }
        for (key, cfg) in changed {
            let entry = state.applied.entry(key.to_string()).or_default();
            entry.level = cfg.level;
            if cfg.propagate.is_some() {
                entry.propagate = cfg.propagate;
            }
        }
        internal::debug("REGISTRY", "Applied incremental config");
    }

    fn build(&self, state: &State, config: &DictConfig) -> Result<Built, crate::Error> {
        let mut formatters: BTreeMap<&str, Formatter> = BTreeMap::new();
        for (name, cfg) in &config.formatters {
            let formatter = cfg
                .build()
                .map_err(|e| crate::Error::Config(format!("formatter '{name}': {e}")))?;
            formatters.insert(name, formatter);
        }

        let mut filters: BTreeMap<String, Arc<dyn Filter>> = BTreeMap::new();
        for (name, cfg) in &config.filters {
            let class = cfg.class.as_deref().unwrap_or("name");
            let factory = state
                .filter_classes
                .get(class)
                .ok_or_else(|| crate::Error::Config(format!("filter '{name}': unknown class '{class}'")))?;
            filters.insert(name.clone(), factory(&FactoryArgs::new(name, class, &cfg.args))?);
        }

        let mut handlers = BTreeMap::new();
        for (name, cfg) in &config.handlers {
            let factory = state.handler_classes.get(&cfg.class).ok_or_else(|| {
                crate::Error::Config(format!("handler '{name}': unknown class '{}'", cfg.class))
            })?;
            let mut handler = factory(&FactoryArgs::new(name, &cfg.class, &cfg.args))?
                .name(name.clone())
                .level(cfg.level)
                .raise_errors(self.raise_errors);
            if let Some(fmt_name) = &cfg.formatter {
                let formatter = formatters
                    .get(fmt_name.as_str())
                    .ok_or_else(|| undefined("formatter", fmt_name))?;
                handler = handler.formatter(formatter.clone());
            }
            for filter in lookup_filters(&filters, &cfg.filters)? {
                handler = handler.shared_filter(filter);
            }
            handlers.insert(name.clone(), Arc::new(handler));
        }

        for cfg in config.root.iter().chain(config.loggers.values()) {
            if let Some(missing) = cfg.handlers.iter().find(|h| !handlers.contains_key(*h)) {
                return Err(undefined("handler", missing));
            }
            lookup_filters(&filters, &cfg.filters)?;
        }

        Ok(Built { handlers, filters })
    }

    /// First level set on `name`, its existing ancestors, or root.
    /// `None` lets every record through.
    #[must_use]
    pub fn effective_level(&self, name: &str) -> Option<Level> {
        self.lock().chain(name).iter().find_map(|logger| logger.level())
    }

    /// Routes a record from its named logger up the dotted hierarchy.
    ///
    /// The originating logger gates the record with its effective level,
    /// disabled flag and filters, so `SetLevel` directives take effect on
    /// records from every producer. The walk stops after a logger with
    /// `propagate = false`. Returns how many handlers emitted.
    ///
    /// # Errors
    /// Only from handlers built with `raise_errors`.
    pub fn handle(&self, record: &LogRecord) -> Result<usize, crate::Error> {
        let chain = self.lock().chain(&record.name);
        let Some(origin) = chain.first() else {
            return Ok(0);
        };
        let effective = chain.iter().find_map(|logger| logger.level());
        if effective.is_some_and(|min| record.level < min) {
            internal::trace(
                "REGISTRY",
                &format!("'{}' below its effective level", record.name),
            );
            return Ok(0);
        }
        if origin.is_disabled() || !origin.passes_filters(record) {
            return Ok(0);
        }

        let mut emitted = 0;
        for logger in &chain {
            emitted += logger.call_handlers(record)?;
            if !logger.propagate() {
                break;
            }
        }
        if emitted == 0 {
            internal::trace(
                "REGISTRY",
                &format!("No handler emitted record for '{}'", record.name),
            );
        }
        Ok(emitted)
    }

    /// Flushes every configured handler; failures are reported, not returned.
    pub fn flush_all(&self) {
        let handlers: Vec<_> = self.lock().handlers.values().cloned().collect();
        for handler in handlers {
            if let Err(e) = handler.flush() {
                internal::warn(
                    "REGISTRY",
                    &format!("Flushing '{}' failed: {e}", handler.handler_name()),
                );
            }
        }
    }

    /// Flushes and closes every configured handler and forgets them.
    pub fn close_all(&self) {
        let handlers = std::mem::take(&mut self.lock().handlers);
        for (name, handler) in handlers {
            if let Err(e) = handler.close() {
                internal::warn("REGISTRY", &format!("Closing '{name}' failed: {e}"));
            }
        }
    }
}

fn undefined(kind: &str, name: &str) -> crate::Error {
    crate::Error::Config(format!("undefined {kind}: '{name}'"))
}

fn lookup_filters(
    filters: &BTreeMap<String, Arc<dyn Filter>>,
    names: &[String],
) -> Result<Vec<Arc<dyn Filter>>, crate::Error> {
    names
        .iter()
        .map(|n| filters.get(n).cloned().ok_or_else(|| undefined("filter", n)))
        .collect()
}
