// src/engine/supervisor.rs

//! Top-level orchestration of one `taskvisor` invocation.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigFile, TaskConfig};
use crate::engine::interrupt::{InterruptCoordinator, chained_tasks, next_interrupt};
use crate::engine::registry::ProgramRegistry;
use crate::engine::runner::TaskRunner;
use crate::errors::{Result, SupervisorError};
use crate::exec::{ConsoleSink, EnvOverlay, LogSink};
use crate::types::InterruptSignal;

/// What happened during a run that did not abort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Every program started, in launch order.
    pub launched: Vec<String>,
    /// Programs that exited unsuccessfully without `IgnoreError`.
    pub failures: Vec<String>,
    /// Set when the run was cut short by a signal.
    pub interrupted: Option<InterruptSignal>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// `Err(ScriptsFailed)` if any failure was recorded.
    pub fn into_result(self) -> Result<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(SupervisorError::ScriptsFailed(self.failures))
        }
    }
}

enum Flow {
    Completed(Result<()>),
    Interrupted(InterruptSignal),
}

/// Drives requested tasks, reacts to interrupts, and aggregates results.
#[derive(Debug)]
pub struct Supervisor {
    config: ConfigFile,
    base_dir: PathBuf,
    console: Arc<dyn LogSink>,
    quiet: bool,
}

impl Supervisor {
    /// `base_dir` is where relative script paths and env files are resolved.
    pub fn new(config: ConfigFile, base_dir: PathBuf) -> Self {
        Self {
            config,
            base_dir,
            console: Arc::new(ConsoleSink),
            quiet: false,
        }
    }

    /// Replace the console sink (tests capture output this way).
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.console = sink;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Requested tasks that exist, in the order given. Unknown names are
    /// dropped.
    pub fn resolve_tasks(&self, requested: &[String]) -> Vec<&TaskConfig> {
        requested
            .iter()
            .filter_map(|name| {
                let task = self.config.task(name);
                if task.is_none() {
                    debug!(task = %name, "unknown task requested; skipping");
                }
                task
            })
            .collect()
    }

    /// Check env files and executables of every task this run may launch
    /// (including interrupt chains) before anything is spawned.
    pub fn preflight(&self, requested: &[String]) -> Result<()> {
        let mut tasks = self.resolve_tasks(requested);
        for chained in chained_tasks(&self.config, requested) {
            if !tasks.iter().any(|t| t.name == chained.name) {
                tasks.push(chained);
            }
        }

        for task in tasks {
            EnvOverlay::for_task(task, &self.base_dir)?;
            for script in task.scripts.iter() {
                let path = script.resolve_path(&self.base_dir);
                if !path.exists() {
                    return Err(SupervisorError::MissingExecutable {
                        script: script.name.clone(),
                        path,
                    });
                }
            }
        }
        Ok(())
    }

    /// Run `requested` tasks in order while listening on `interrupts`.
    ///
    /// - Fatal errors (missing executable, health timeout, ...) terminate every
    ///   launched program and come back as `Err`.
    /// - An interrupt preempts the main flow; after the interrupt behaviour
    ///   ran, everything is terminated and the report carries the signal.
    /// - Otherwise all programs are checked and terminated, and the report
    ///   lists non-ignored failures.
    pub async fn run(
        &self,
        requested: &[String],
        mut interrupts: mpsc::Receiver<InterruptSignal>,
    ) -> Result<RunReport> {
        self.preflight(requested)?;

        let registry = ProgramRegistry::new();
        let runner = TaskRunner::new(self.base_dir.clone(), registry.clone(), Arc::clone(&self.console))?
            .quiet(self.quiet);
        let started: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let grace = self.config.settings.kill_grace();

        let flow = tokio::select! {
            biased;
            signal = next_interrupt(&mut interrupts) => Flow::Interrupted(signal),
            res = self.run_requested(&runner, requested, &started) => Flow::Completed(res),
        };

        match flow {
            Flow::Completed(Ok(())) => Ok(self.aggregate(&registry, grace).await),
            Flow::Completed(Err(err)) => {
                report_fatal(&err);
                registry.terminate_all(grace).await;
                Err(err)
            }
            Flow::Interrupted(signal) => {
                let started = started
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                let coordinator = InterruptCoordinator::new(&self.config, &runner, &registry);

                let handled = tokio::select! {
                    res = coordinator.handle(signal, &started) => res,
                    again = next_interrupt(&mut interrupts) => {
                        warn!(signal = again.label(), "second signal; force-killing everything");
                        registry.force_kill_all();
                        Ok(())
                    }
                };
                if let Err(err) = &handled {
                    report_fatal(err);
                }
                registry.terminate_all(grace).await;
                handled?;

                info!(signal = signal.label(), "shutdown after interrupt complete");
                Ok(RunReport {
                    launched: launched_names(&registry),
                    failures: Vec::new(),
                    interrupted: Some(signal),
                })
            }
        }
    }

    async fn run_requested(
        &self,
        runner: &TaskRunner,
        requested: &[String],
        started: &Mutex<Vec<String>>,
    ) -> Result<()> {
        for task in self.resolve_tasks(requested) {
            started
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(task.name.clone());

            let run = runner.run(task).await?;
            if task.wait_for_finish && run.background_count() > 0 {
                info!(task = %task.name, background = run.background_count(), "waiting for background scripts to finish");
                run.wait_for_background().await;
            }
        }
        Ok(())
    }

    /// Record non-ignored failures, then terminate every program regardless
    /// of its state.
    async fn aggregate(&self, registry: &ProgramRegistry, grace: Duration) -> RunReport {
        let mut failures = Vec::new();
        for program in registry.snapshot() {
            let Some(status) = program.exit_status() else {
                continue;
            };
            if status.success() {
                continue;
            }
            if program.ignore_failure() {
                info!(program = %program.name(), exit_code = ?status.code(), "failure ignored");
            } else {
                error!(program = %program.name(), exit_code = ?status.code(), "error in program");
                failures.push(program.name().to_string());
            }
        }

        registry.terminate_all(grace).await;

        let report = RunReport {
            launched: launched_names(registry),
            failures,
            interrupted: None,
        };
        info!(
            launched = report.launched.len(),
            failed = report.failures.len(),
            "run finished"
        );
        report
    }
}

fn launched_names(registry: &ProgramRegistry) -> Vec<String> {
    registry
        .snapshot()
        .iter()
        .map(|p| p.name().to_string())
        .collect()
}

fn report_fatal(err: &SupervisorError) {
    if let SupervisorError::HealthTimeout { script, output, .. } = err {
        for line in output.iter() {
            error!(program = %script, "LOG: {}", line);
        }
    }
    error!(error = %err, "aborting run");
}
