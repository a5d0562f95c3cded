use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::InterruptMode;

/// Configuration as read from disk, before validation.
///
/// Two shapes are accepted. A bare list of tasks:
///
/// ```json
/// [
///   { "Name": "hello", "Scripts": [ { "Name": "hi", "Path": "/bin/echo", "AbsPath": true } ] }
/// ]
/// ```
///
/// or a document with optional global settings:
///
/// ```json
/// { "Settings": { "InterruptMode": "kill" }, "Tasks": [ ... ] }
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", from = "ConfigShape")]
pub struct RawConfigFile {
    pub settings: Settings,
    pub tasks: Vec<TaskConfig>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigShape {
    List(Vec<TaskConfig>),
    Document(ConfigDocument),
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct ConfigDocument {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    tasks: Vec<TaskConfig>,
}

impl From<ConfigShape> for RawConfigFile {
    fn from(shape: ConfigShape) -> Self {
        match shape {
            ConfigShape::List(tasks) => RawConfigFile {
                settings: Settings::default(),
                tasks,
            },
            ConfigShape::Document(doc) => RawConfigFile {
                settings: doc.settings,
                tasks: doc.tasks,
            },
        }
    }
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigFile {
    pub settings: Settings,
    pub tasks: Vec<TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(settings: Settings, tasks: Vec<TaskConfig>) -> Self {
        Self { settings, tasks }
    }

    /// Look up a task by name.
    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.tasks.iter().find(|t| t.name == name)
    }
}

/// `Settings` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    /// `"chain"` (default) or `"kill"`.
    #[serde(default)]
    pub interrupt_mode: InterruptMode,

    /// Seconds to wait after SIGTERM before a program group gets SIGKILL
    /// during shutdown.
    #[serde(default = "default_kill_timeout")]
    pub kill_timeout: u64,
}

fn default_kill_timeout() -> u64 {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interrupt_mode: InterruptMode::default(),
            kill_timeout: default_kill_timeout(),
        }
    }
}

impl Settings {
    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_timeout)
    }
}

/// One key/value environment entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A named unit of work: an ordered list of scripts sharing an environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskConfig {
    pub name: String,

    /// Optional `.env`-style file, relative to the working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_file: Option<String>,

    /// Task-level overlays, applied after the env file.
    #[serde(default)]
    pub envs: Vec<EnvVar>,

    #[serde(default)]
    pub scripts: Vec<ScriptConfig>,

    /// Tasks to run when the supervisor is interrupted while this task is active.
    #[serde(default)]
    pub on_interrupt: Vec<String>,

    /// Block after launching this task until its background scripts exit.
    #[serde(default)]
    pub wait_for_finish: bool,
}

/// A single external program invocation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScriptConfig {
    pub name: String,

    pub path: String,

    /// If false, `path` is resolved against the working directory.
    #[serde(default)]
    pub abs_path: bool,

    #[serde(default)]
    pub args: Vec<String>,

    /// `http://...` or `tcp://host:port`; empty means healthy once spawned.
    #[serde(default)]
    pub health_check: String,

    /// Do not wait for the program to exit before moving on.
    #[serde(default)]
    pub bg_mode: bool,

    /// Health-check window in seconds.
    #[serde(default)]
    pub timeout: u64,

    /// A non-zero exit of this script does not fail the run.
    #[serde(default)]
    pub ignore_error: bool,

    /// Script-level overlays; they win over task-level ones.
    #[serde(default)]
    pub envs: Vec<EnvVar>,

    /// Seconds to pause after this script is launched.
    #[serde(default)]
    pub sleep_after: u64,

    /// Stream output to the console. When false it only reaches the debug log.
    #[serde(default = "default_log")]
    pub log: bool,
}

fn default_log() -> bool {
    true
}

impl ScriptConfig {
    /// Location of the executable, honouring `AbsPath`.
    pub fn resolve_path(&self, base_dir: &Path) -> PathBuf {
        if self.abs_path {
            PathBuf::from(&self.path)
        } else {
            base_dir.join(self.path.trim_start_matches('/'))
        }
    }

    pub fn sleep_after(&self) -> Duration {
        Duration::from_secs(self.sleep_after)
    }
}
