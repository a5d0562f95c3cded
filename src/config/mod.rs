// src/config/mod.rs

//! Configuration loading and validation for taskvisor.
//!
//! Responsibilities:
//! - Define the serde-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants like unique names and known interrupt chains
//!   (`validate.rs`).
//! - Write a starter config for `--init` (`scaffold.rs`).

pub mod loader;
pub mod model;
pub mod scaffold;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_config_str};
pub use model::{ConfigFile, EnvVar, RawConfigFile, ScriptConfig, Settings, TaskConfig};
