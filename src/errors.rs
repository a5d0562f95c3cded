// src/errors.rs

//! Crate-wide error type and the exit-code policy attached to it.

use std::path::PathBuf;

use thiserror::Error;

/// Exit status for generic failures and for runs with failing scripts.
pub const EXIT_FAILURE: i32 = 1;
/// Exit status when a script never became healthy within its timeout.
pub const EXIT_HEALTH_TIMEOUT: i32 = 2;
/// Exit status for configuration problems detected before anything ran.
pub const EXIT_CONFIG: i32 = 3;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("executable for script '{script}' does not exist: {}", .path.display())]
    MissingExecutable { script: String, path: PathBuf },

    #[error("failed to read env file {}: {source}", .path.display())]
    EnvFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to spawn script '{script}': {source}")]
    Spawn {
        script: String,
        source: std::io::Error,
    },

    /// The script never passed its health check. `output` holds whatever the
    /// program printed before the supervisor gave up on it.
    #[error("script '{script}' not responding after {timeout_secs}s")]
    HealthTimeout {
        script: String,
        timeout_secs: u64,
        output: Vec<String>,
    },

    #[error("error in application found; failing scripts: {}", .0.join(", "))]
    ScriptsFailed(Vec<String>),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SupervisorError {
    /// Process exit status `main` should use for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            SupervisorError::HealthTimeout { .. } => EXIT_HEALTH_TIMEOUT,
            SupervisorError::ConfigError(_)
            | SupervisorError::JsonError(_)
            | SupervisorError::TomlError(_)
            | SupervisorError::MissingExecutable { .. }
            | SupervisorError::EnvFile { .. } => EXIT_CONFIG,
            _ => EXIT_FAILURE,
        }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
