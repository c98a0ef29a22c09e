// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `execwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "execwatch",
    version,
    about = "Run commands with timeouts, stream redirection and a failure policy.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `EXECWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Run the jobs of a config file.
    Run(RunArgs),
    /// Run a built-in entry point in this process and exit with its code.
    ///
    /// This is what forked entry points are launched with.
    Entry(EntryArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Execwatch.toml")]
    pub config: String,

    /// Run only this job.
    #[arg(long, value_name = "NAME")]
    pub job: Option<String>,

    /// Parse + validate and print the jobs, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Args)]
pub struct EntryArgs {
    /// Classpath entries, joined with the platform path separator.
    #[arg(long, value_name = "PATH")]
    pub classpath: Option<String>,

    /// System property, repeatable.
    #[arg(short = 'D', value_name = "NAME=VALUE")]
    pub property: Vec<String>,

    /// Entry point name.
    pub name: String,

    /// Arguments passed to the entry point.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
