use crate::config::Config;
use crate::envelope::{ConfigDirective, Envelope};
use crate::internal;
use crate::level::Level;
use std::process::ExitCode;

#[must_use]
pub fn cmd_set_level(config: &Config, logger: &str, level: &str) -> ExitCode {
    let level = match Level::parse_optional(level) {
        Ok(level) => level,
        Err(e) => {
            internal::error("CLI", &e.to_string());
            return ExitCode::FAILURE;
        }
    };
    let Some(context) = super::attach(config) else {
        return ExitCode::FAILURE;
    };
    let directive = ConfigDirective::SetLevel {
        logger: logger.to_string(),
        level,
    };
    match context.send(&Envelope::config(directive)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            internal::error("CLI", &format!("Send failed: {e}"));
            ExitCode::FAILURE
        }
    }
}
