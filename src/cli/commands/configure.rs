use crate::config::Config;
use crate::dictconfig::DictConfig;
use crate::envelope::{ConfigDirective, Envelope};
use crate::internal;
use std::path::Path;
use std::process::ExitCode;

/// The file is validated locally so a malformed config fails here rather
/// than only in the listener's diagnostics.
#[must_use]
pub fn cmd_configure(config: &Config, file: &Path) -> ExitCode {
    let dict = match DictConfig::from_file(file) {
        Ok(dict) => dict,
        Err(e) => {
            internal::error("CLI", &format!("{}: {e}", file.display()));
            return ExitCode::FAILURE;
        }
    };
    let Some(context) = super::attach(config) else {
        return ExitCode::FAILURE;
    };
    match context.send(&Envelope::config(ConfigDirective::Dict(dict))) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            internal::error("CLI", &format!("Send failed: {e}"));
            ExitCode::FAILURE
        }
    }
}
