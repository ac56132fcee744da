//! One file per subcommand; each returns the process exit code.

mod configure;
mod listen;
mod send;
mod set_level;
mod stop;

pub use configure::cmd_configure;
pub use listen::cmd_listen;
pub use send::cmd_send;
pub use set_level::cmd_set_level;
pub use stop::cmd_stop;

use crate::config::Config;
use crate::context::LogContext;
use crate::internal;

/// Connects to the listener's queue, reporting a missing listener.
fn attach(config: &Config) -> Option<LogContext> {
    match LogContext::attach_with_config(config) {
        Ok(context) => Some(context),
        Err(e) => {
            internal::error(
                "CLI",
                &format!(
                    "No listener at {}: {e}",
                    config.runtime_dir().display()
                ),
            );
            None
        }
    }
}
