// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `taskvisor`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskvisor",
    version,
    about = "Launch, health-check and supervise the scripts of named tasks.",
    long_about = None
)]
pub struct CliArgs {
    /// Tasks to run, in order. Unknown names are ignored.
    #[arg(value_name = "TASK", required_unless_present = "init")]
    pub tasks: Vec<String>,

    /// Path to the task definition file (JSON, or TOML with a `.toml` extension).
    ///
    /// Default: `taskvisor.json` in the current working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKVISOR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate and print the requested tasks, but don't launch anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Send program output to the debug log instead of stdout.
    #[arg(long)]
    pub quiet: bool,

    /// Write a starter config file at `--config` and exit.
    #[arg(long)]
    pub init: bool,
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
