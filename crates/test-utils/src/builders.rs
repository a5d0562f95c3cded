#![allow(dead_code)]

use taskvisor::config::{ConfigFile, EnvVar, RawConfigFile, ScriptConfig, Settings, TaskConfig};
use taskvisor::types::InterruptMode;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                settings: Settings::default(),
                tasks: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, task: TaskConfig) -> Self {
        self.config.tasks.push(task);
        self
    }

    pub fn interrupt_mode(mut self, mode: InterruptMode) -> Self {
        self.config.settings.interrupt_mode = mode;
        self
    }

    pub fn kill_timeout(mut self, secs: u64) -> Self {
        self.config.settings.kill_timeout = secs;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            task: TaskConfig {
                name: name.to_string(),
                env_file: None,
                envs: vec![],
                scripts: vec![],
                on_interrupt: vec![],
                wait_for_finish: false,
            },
        }
    }

    pub fn script(mut self, script: ScriptConfig) -> Self {
        self.task.scripts.push(script);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.task.envs.push(EnvVar::new(key, value));
        self
    }

    pub fn env_file(mut self, path: &str) -> Self {
        self.task.env_file = Some(path.to_string());
        self
    }

    pub fn on_interrupt(mut self, task: &str) -> Self {
        self.task.on_interrupt.push(task.to_string());
        self
    }

    pub fn wait_for_finish(mut self, val: bool) -> Self {
        self.task.wait_for_finish = val;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Builder for `ScriptConfig`.
pub struct ScriptConfigBuilder {
    script: ScriptConfig,
}

impl ScriptConfigBuilder {
    pub fn new(name: &str, path: &str) -> Self {
        Self {
            script: ScriptConfig {
                name: name.to_string(),
                path: path.to_string(),
                abs_path: false,
                args: vec![],
                health_check: String::new(),
                bg_mode: false,
                timeout: 0,
                ignore_error: false,
                envs: vec![],
                sleep_after: 0,
                log: true,
            },
        }
    }

    /// `/bin/sh -c <cmd>`, the most convenient script for tests.
    pub fn shell(name: &str, cmd: &str) -> Self {
        Self::new(name, "/bin/sh")
            .abs_path(true)
            .arg("-c")
            .arg(cmd)
    }

    pub fn abs_path(mut self, val: bool) -> Self {
        self.script.abs_path = val;
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.script.args.push(arg.to_string());
        self
    }

    pub fn health_check(mut self, endpoint: &str) -> Self {
        self.script.health_check = endpoint.to_string();
        self
    }

    pub fn background(mut self, val: bool) -> Self {
        self.script.bg_mode = val;
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.script.timeout = secs;
        self
    }

    pub fn ignore_error(mut self, val: bool) -> Self {
        self.script.ignore_error = val;
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.script.envs.push(EnvVar::new(key, value));
        self
    }

    pub fn sleep_after(mut self, secs: u64) -> Self {
        self.script.sleep_after = secs;
        self
    }

    pub fn log(mut self, val: bool) -> Self {
        self.script.log = val;
        self
    }

    pub fn build(self) -> ScriptConfig {
        self.script
    }
}
