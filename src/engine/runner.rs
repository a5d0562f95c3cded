// src/engine/runner.rs

//! Runs the scripts of one task, strictly in declared order.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::{ScriptConfig, TaskConfig};
use crate::engine::registry::ProgramRegistry;
use crate::errors::Result;
use crate::exec::{EnvOverlay, HealthProber, LogSink, Program, RunOptions, TracingSink};

/// Programs launched for one task.
#[derive(Debug, Clone)]
pub struct TaskRun {
    pub task: String,
    /// Keyed by script name.
    pub programs: BTreeMap<String, Arc<Program>>,
    /// Names of the scripts launched in background mode, in launch order.
    pub background: Vec<String>,
}

impl TaskRun {
    fn new(task: &str) -> Self {
        Self {
            task: task.to_string(),
            programs: BTreeMap::new(),
            background: Vec::new(),
        }
    }

    pub fn background_count(&self) -> usize {
        self.background.len()
    }

    /// Block until every background program of this task has exited.
    pub async fn wait_for_background(&self) {
        for name in self.background.iter() {
            if let Some(program) = self.programs.get(name) {
                debug!(task = %self.task, program = %name, "waiting for background program");
                program.wait().await;
            }
        }
    }
}

/// Launches task scripts and records them in the shared registry.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    base_dir: PathBuf,
    registry: ProgramRegistry,
    prober: HealthProber,
    console: Arc<dyn LogSink>,
    quiet: bool,
}

impl TaskRunner {
    pub fn new(
        base_dir: PathBuf,
        registry: ProgramRegistry,
        console: Arc<dyn LogSink>,
    ) -> Result<Self> {
        Ok(Self {
            base_dir,
            registry,
            prober: HealthProber::new()?,
            console,
            quiet: false,
        })
    }

    /// Route all program output to the debug log.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Launch every script of `task` in order.
    ///
    /// Each program is registered as soon as it is spawned, so a later fatal
    /// error or an interrupt can still kill it. The first fatal error stops
    /// the task.
    pub async fn run(&self, task: &TaskConfig) -> Result<TaskRun> {
        info!(task = %task.name, scripts = task.scripts.len(), "running task");

        let task_env = EnvOverlay::for_task(task, &self.base_dir)?;
        let mut run = TaskRun::new(&task.name);

        for script in task.scripts.iter() {
            let options = RunOptions::from_script(script)?;
            let env = task_env.with_script(script);
            let index = self.registry.next_launch_index();

            let program = Arc::new(Program::start(script, &self.base_dir, &env, index)?);
            self.registry.register(Arc::clone(&program));
            program
                .run(&options, &self.prober, self.sink_for(script))
                .await?;

            if options.background {
                run.background.push(script.name.clone());
            }
            run.programs.insert(script.name.clone(), program);

            if script.sleep_after > 0 {
                debug!(task = %task.name, program = %script.name, secs = script.sleep_after, "sleeping after launch");
                sleep(script.sleep_after()).await;
            }
        }

        info!(
            task = %task.name,
            launched = run.programs.len(),
            background = run.background_count(),
            "task launched"
        );
        Ok(run)
    }

    fn sink_for(&self, script: &ScriptConfig) -> Arc<dyn LogSink> {
        if self.quiet || !script.log {
            Arc::new(TracingSink)
        } else {
            Arc::clone(&self.console)
        }
    }
}
