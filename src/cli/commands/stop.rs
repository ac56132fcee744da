use crate::config::Config;
use crate::internal;
use std::process::ExitCode;

#[must_use]
pub fn cmd_stop(config: &Config) -> ExitCode {
    let Some(context) = super::attach(config) else {
        return ExitCode::FAILURE;
    };
    match context.request_stop() {
        Ok(()) => {
            internal::info("CLI", "Stop requested");
            ExitCode::SUCCESS
        }
        Err(e) => {
            internal::error("CLI", &format!("Cannot set stop event: {e}"));
            ExitCode::FAILURE
        }
    }
}
