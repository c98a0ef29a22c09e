// src/logging.rs

//! Process-wide `tracing` subscriber for the `execwatch` binary.
//!
//! Events are written to stderr. Stdout belongs to the jobs: `run` prints
//! published variables there and a forked `entry` child's stdout is the
//! stream its parent redirects.
//!
//! The level is taken from the first of:
//! - `--log-level`;
//! - `EXECWATCH_LOG`;
//! - the fallback chosen by the subcommand.
//!
//! `entry` falls back to `warn`, so a forked child adds nothing to the stderr
//! its parent is capturing unless something actually went wrong.

use anyhow::{Result, anyhow};
use tracing::Level;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV_VAR: &str = "EXECWATCH_LOG";

/// Install the subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>, fallback: LogLevel) -> Result<()> {
    let level = effective_level(cli_level, std::env::var(LOG_ENV_VAR).ok().as_deref(), fallback);

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))
}

/// An unparseable `EXECWATCH_LOG` value is ignored rather than fatal.
fn effective_level(cli: Option<LogLevel>, env_value: Option<&str>, fallback: LogLevel) -> Level {
    cli.map(Level::from)
        .or_else(|| env_value.and_then(parse_level_str))
        .unwrap_or_else(|| fallback.into())
}

impl From<LogLevel> for Level {
    fn from(lvl: LogLevel) -> Self {
        match lvl {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
