//! `relaylog` binary: runs a listener or sends to one.
//!
//! Usage:
//!   relaylog listen [--logging FILE]        Run the listener in the foreground
//!   relaylog send <logger> <level> <msg>    Enqueue one record
//!   relaylog configure <FILE.json>          Enqueue a dict-config
//!   relaylog set-level <logger> <level>     Change a logger's level
//!   relaylog stop                           Stop the listener
//!
//! `--dir` and `--config` apply to every subcommand.

use clap::Parser;
use relaylog::cli::{Cli, Command, cmd_configure, cmd_listen, cmd_send, cmd_set_level, cmd_stop};
use relaylog::internal;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            return ExitCode::FAILURE;
        }
    };
    internal::init_with_config(&config);

    match &cli.command {
        Command::Listen { logging } => cmd_listen(&config, logging.as_deref()),
        Command::Send {
            logger,
            level,
            message,
        } => cmd_send(&config, logger, (*level).into(), message),
        Command::Configure { file } => cmd_configure(&config, file),
        Command::SetLevel { logger, level } => cmd_set_level(&config, logger, level),
        Command::Stop => cmd_stop(&config),
    }
}
