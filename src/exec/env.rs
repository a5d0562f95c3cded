// src/exec/env.rs

//! Environment overlays applied to spawned programs.
//!
//! Children inherit the supervisor's environment; on top of that each spawn
//! gets an explicit, ordered overlay composed as
//! `task EnvFile < task Envs < script Envs`. Later entries win. Nothing here
//! touches the supervisor's own process environment.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;

use crate::config::{EnvVar, ScriptConfig, TaskConfig};
use crate::errors::{Result, SupervisorError};

static ENV_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:export\s+)?([A-Za-z_][A-Za-z0-9_.]*)\s*=\s*(.*?)\s*$")
        .expect("env line regex is valid")
});

/// Ordered key/value pairs to set on a child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    vars: Vec<(String, String)>,
}

impl EnvOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Task-level overlay: the task's env file (if any) followed by its `Envs`.
    pub fn for_task(task: &TaskConfig, base_dir: &Path) -> Result<Self> {
        let mut overlay = Self::new();
        if let Some(env_file) = task.env_file.as_deref() {
            let path = base_dir.join(env_file);
            let contents = fs::read_to_string(&path)
                .map_err(|source| SupervisorError::EnvFile { path: path.clone(), source })?;
            overlay.vars.extend(parse_env_file(&contents).map_err(|e| {
                SupervisorError::ConfigError(format!("{}: {}", path.display(), e))
            })?);
        }
        overlay.extend(&task.envs);
        Ok(overlay)
    }

    /// A copy of this overlay with the script's own entries appended.
    pub fn with_script(&self, script: &ScriptConfig) -> Self {
        let mut overlay = self.clone();
        overlay.extend(&script.envs);
        overlay
    }

    pub fn extend(&mut self, vars: &[EnvVar]) {
        self.vars
            .extend(vars.iter().map(|v| (v.key.clone(), v.value.clone())));
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Final value per key after ordering is applied.
    pub fn resolved(&self) -> HashMap<&str, &str> {
        self.vars
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    /// Value a child would see for `key`, if the overlay sets it.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set every entry on `cmd`, in order.
    pub fn apply(&self, cmd: &mut Command) {
        for (key, value) in self.vars.iter() {
            cmd.env(key, value);
        }
    }
}

/// Parse `.env`-style content: `KEY=VALUE` lines, optional `export ` prefix,
/// `#` comments, and single- or double-quoted values.
pub fn parse_env_file(contents: &str) -> std::result::Result<Vec<(String, String)>, String> {
    let mut vars = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let caps = ENV_LINE
            .captures(line)
            .ok_or_else(|| format!("line {}: expected KEY=VALUE", idx + 1))?;
        vars.push((caps[1].to_string(), unquote(&caps[2])));
    }
    Ok(vars)
}

fn unquote(raw: &str) -> String {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == b'"' && last == b'"' {
            return raw[1..raw.len() - 1].replace("\\n", "\n").replace("\\\"", "\"");
        }
        if first == b'\'' && last == b'\'' {
            return raw[1..raw.len() - 1].to_string();
        }
    }
    // Unquoted values may carry a trailing ` # comment`.
    match raw.find(" #") {
        Some(pos) => raw[..pos].trim_end().to_string(),
        None => raw.to_string(),
    }
}
