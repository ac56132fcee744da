use crate::config::Config;
use crate::envelope::Envelope;
use crate::internal;
use crate::level::Level;
use crate::record::LogRecord;
use std::process::ExitCode;

/// Unlike a `Producer`, reports queue failures through the exit code.
#[must_use]
pub fn cmd_send(config: &Config, logger: &str, level: Level, message: &[String]) -> ExitCode {
    let Some(context) = super::attach(config) else {
        return ExitCode::FAILURE;
    };
    let record = LogRecord::new(logger, level, message.join(" "));
    match context.send(&Envelope::record(record)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            internal::error("CLI", &format!("Send failed: {e}"));
            ExitCode::FAILURE
        }
    }
}
