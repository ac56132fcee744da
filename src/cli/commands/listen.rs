use crate::config::Config;
use crate::context::LogContext;
use crate::dictconfig::DictConfig;
use crate::internal;
use crate::listener::QueueListener;
use crate::registry::Registry;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

/// Runs the listener on this process until `relaylog stop` sets the stop event.
#[must_use]
pub fn cmd_listen(config: &Config, logging: Option<&Path>) -> ExitCode {
    let initial = match logging {
        Some(path) => DictConfig::from_file(path).map(Some),
        None => config.logging_config(),
    };
    let initial = match initial {
        Ok(initial) => initial,
        Err(e) => {
            internal::error("CLI", &format!("Invalid logging config: {e}"));
            return ExitCode::FAILURE;
        }
    };

    let registry = Arc::new(Registry::new().raise_errors(config.listener.raise_on_exc));
    if let Some(dict) = &initial
        && let Err(e) = registry.apply(dict)
    {
        internal::error("CLI", &format!("Cannot apply logging config: {e}"));
        return ExitCode::FAILURE;
    }

    let context = match LogContext::init_with_config(config) {
        Ok(context) => context,
        Err(e) => {
            internal::error("CLI", &format!("Cannot create queue: {e}"));
            return ExitCode::FAILURE;
        }
    };
    internal::info(
        "CLI",
        &format!("Listening on {}", context.queue().path().display()),
    );

    QueueListener::for_context(&context, registry)
        .raise_on_exc(config.listener.raise_on_exc)
        .poll_interval(config.poll_interval())
        .start();
    ExitCode::SUCCESS
}
