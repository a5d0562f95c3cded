// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the scripts defined in
//! the tasks, using `tokio::process::Command`, and handing their output to
//! the console.
//!
//! - [`program`] owns one spawned process group: start, health loop, wait,
//!   kill.
//! - [`health`] contains the HTTP and TCP liveness probes.
//! - [`output`] captures combined stdout/stderr and multiplexes it onto a
//!   [`LogSink`] with colored name prefixes.
//! - [`env`] builds the environment overlay each child is spawned with.

pub mod env;
pub mod health;
pub mod output;
pub mod program;

pub use env::EnvOverlay;
pub use health::{HealthCheck, HealthProber};
pub use output::{ConsoleSink, LogSink, TracingSink, color_for};
pub use program::{Program, RunOptions};
