// src/config/scaffold.rs

//! Starter configuration written by `taskvisor --init`.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::info;

use crate::config::model::{ConfigFile, EnvVar, ScriptConfig, Settings, TaskConfig};
use crate::errors::{Result, SupervisorError};

/// The config written by `--init`: one `hello` task with a single foreground
/// script, plus a `cleanup` task wired as its interrupt chain.
pub fn starter_config() -> ConfigFile {
    let hello = ScriptConfig {
        name: "hello".to_string(),
        path: "/bin/sh".to_string(),
        abs_path: true,
        args: vec!["-c".to_string(), "echo hello from $GREETER".to_string()],
        health_check: String::new(),
        bg_mode: false,
        timeout: 10,
        ignore_error: false,
        envs: vec![],
        sleep_after: 0,
        log: true,
    };

    let cleanup = ScriptConfig {
        name: "cleanup".to_string(),
        path: "/bin/echo".to_string(),
        abs_path: true,
        args: vec!["cleaning up".to_string()],
        timeout: 5,
        ..hello.clone()
    };

    ConfigFile::new_unchecked(
        Settings::default(),
        vec![
            TaskConfig {
                name: "hello".to_string(),
                env_file: None,
                envs: vec![EnvVar::new("GREETER", "taskvisor")],
                scripts: vec![hello],
                on_interrupt: vec!["cleanup".to_string()],
                wait_for_finish: false,
            },
            TaskConfig {
                name: "cleanup".to_string(),
                env_file: None,
                envs: vec![],
                scripts: vec![cleanup],
                on_interrupt: vec![],
                wait_for_finish: false,
            },
        ],
    )
}

/// Write [`starter_config`] as pretty JSON to `path`.
///
/// Refuses to overwrite an existing file.
pub fn write_starter_config(path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&starter_config())?;

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(SupervisorError::ConfigError(format!(
                "{} already exists; not overwriting",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")?;

    info!(path = %path.display(), "wrote starter config");
    Ok(())
}
