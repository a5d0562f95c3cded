// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig};
use crate::errors::{Result, SupervisorError};
use crate::exec::health::HealthCheck;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SupervisorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.settings, raw.tasks))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_task_names(cfg)?;
    for task in cfg.tasks.iter() {
        validate_scripts(task)?;
    }
    validate_interrupt_chains(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.tasks.is_empty() {
        return Err(SupervisorError::ConfigError(
            "config must contain at least one task".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_names(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for task in cfg.tasks.iter() {
        if task.name.trim().is_empty() {
            return Err(SupervisorError::ConfigError(
                "every task needs a non-empty Name".to_string(),
            ));
        }
        if !seen.insert(task.name.as_str()) {
            return Err(SupervisorError::ConfigError(format!(
                "duplicate task name '{}'",
                task.name
            )));
        }
    }
    Ok(())
}

fn validate_scripts(task: &TaskConfig) -> Result<()> {
    let mut seen = HashSet::new();
    for script in task.scripts.iter() {
        if script.name.trim().is_empty() {
            return Err(SupervisorError::ConfigError(format!(
                "task '{}' has a script without a Name",
                task.name
            )));
        }
        if !seen.insert(script.name.as_str()) {
            return Err(SupervisorError::ConfigError(format!(
                "task '{}' has duplicate script name '{}'",
                task.name, script.name
            )));
        }
        if script.path.trim().is_empty() {
            return Err(SupervisorError::ConfigError(format!(
                "script '{}' in task '{}' has an empty Path",
                script.name, task.name
            )));
        }
        script.health_check.parse::<HealthCheck>().map_err(|e| {
            SupervisorError::ConfigError(format!(
                "script '{}' in task '{}': {}",
                script.name, task.name, e
            ))
        })?;
    }
    Ok(())
}

fn validate_interrupt_chains(cfg: &RawConfigFile) -> Result<()> {
    for task in cfg.tasks.iter() {
        for chained in task.on_interrupt.iter() {
            if !cfg.tasks.iter().any(|t| &t.name == chained) {
                return Err(SupervisorError::ConfigError(format!(
                    "task '{}' has unknown task '{}' in `OnInterrupt`",
                    task.name, chained
                )));
            }
        }
    }
    Ok(())
}
