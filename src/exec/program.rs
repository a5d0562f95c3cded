// src/exec/program.rs

//! A single supervised process.
//!
//! A [`Program`] is spawned as the leader of a new process group so that the
//! whole tree it creates can be signalled at once, without ever hitting the
//! supervisor itself. The `Child` handle lives in a reaper task; everyone else
//! observes the exit status through a `watch` channel, which keeps `kill` and
//! `wait` callable from several places at once.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossterm::style::Color;
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::ScriptConfig;
use crate::errors::{Result, SupervisorError};
use crate::exec::env::EnvOverlay;
use crate::exec::health::{HealthCheck, HealthProber};
use crate::exec::output::{self, LogSink};

/// Cadence of the health-check loop; `Timeout` counts these.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound for streaming the last lines once a program is terminated.
pub const OUTPUT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// How a program is driven after spawn.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub background: bool,
    pub timeout_secs: u64,
    pub health: HealthCheck,
    pub poll_interval: Duration,
}

impl RunOptions {
    pub fn from_script(script: &ScriptConfig) -> Result<Self> {
        let health = script
            .health_check
            .parse::<HealthCheck>()
            .map_err(|e| SupervisorError::ConfigError(format!("script '{}': {}", script.name, e)))?;
        Ok(Self {
            background: script.bg_mode,
            timeout_secs: script.timeout,
            health,
            poll_interval: HEALTH_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[derive(Debug)]
pub struct Program {
    name: String,
    launch_index: usize,
    ignore_failure: bool,
    pgid: Pid,
    status: watch::Receiver<Option<ExitStatus>>,
    /// Combined stdout/stderr; taken by the multiplexer once healthy.
    output: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    multiplexer: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl Program {
    /// Spawn `script` in its own process group.
    ///
    /// Fails with [`SupervisorError::MissingExecutable`] if the resolved path
    /// does not exist. Must be called inside a Tokio runtime.
    pub fn start(
        script: &ScriptConfig,
        base_dir: &Path,
        env: &EnvOverlay,
        launch_index: usize,
    ) -> Result<Self> {
        let path = script.resolve_path(base_dir);
        if !path.exists() {
            return Err(SupervisorError::MissingExecutable {
                script: script.name.clone(),
                path,
            });
        }

        let mut cmd = Command::new(&path);
        cmd.args(&script.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        env.apply(&mut cmd);

        info!(
            program = %script.name,
            path = %path.display(),
            args = ?script.args,
            overlay = !env.is_empty(),
            "starting program"
        );

        let spawn_err = |source| SupervisorError::Spawn {
            script: script.name.clone(),
            source,
        };
        let mut child = cmd.spawn().map_err(spawn_err)?;
        let pid = child
            .id()
            .and_then(|id| i32::try_from(id).ok())
            .ok_or_else(|| spawn_err(std::io::Error::other("child has no pid")))?;

        let shutdown = CancellationToken::new();
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            output::spawn_pipe_reader(script.name.clone(), stdout, line_tx.clone(), shutdown.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            output::spawn_pipe_reader(script.name.clone(), stderr, line_tx, shutdown.clone());
        }

        let (status_tx, status_rx) = watch::channel(None);
        spawn_reaper(script.name.clone(), child, status_tx);

        Ok(Self {
            name: script.name.clone(),
            launch_index,
            ignore_failure: script.ignore_error,
            pgid: Pid::from_raw(pid),
            status: status_rx,
            output: Mutex::new(Some(line_rx)),
            multiplexer: Mutex::new(None),
            shutdown,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn launch_index(&self) -> usize {
        self.launch_index
    }

    pub fn color(&self) -> Color {
        output::color_for(self.launch_index)
    }

    pub fn ignore_failure(&self) -> bool {
        self.ignore_failure
    }

    /// Pid of the direct child, which is also its process-group id.
    pub fn pid(&self) -> i32 {
        self.pgid.as_raw()
    }

    /// Exit status, if the direct child has exited.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        *self.status.borrow()
    }

    pub fn has_exited(&self) -> bool {
        self.exit_status().is_some()
    }

    /// Poll until healthy, start streaming output, and (in foreground mode)
    /// block until the child exits.
    pub async fn run(
        &self,
        options: &RunOptions,
        prober: &HealthProber,
        sink: Arc<dyn LogSink>,
    ) -> Result<()> {
        self.wait_until_healthy(options, prober).await?;
        self.start_multiplexer(sink);

        if !options.background {
            let status = self.wait().await;
            debug!(
                program = %self.name,
                exit_code = ?status.and_then(|s| s.code()),
                "foreground program finished"
            );
        }
        Ok(())
    }

    /// The health loop. Every `poll_interval` the probe is tried once; after
    /// more than `timeout_secs` failed rounds the program is declared not
    /// responding and its captured output is returned inside the error.
    ///
    /// Rounds start on a fixed cadence, so a slow probe eats into the wait
    /// before the next round instead of adding to it.
    pub async fn wait_until_healthy(
        &self,
        options: &RunOptions,
        prober: &HealthProber,
    ) -> Result<()> {
        let mut attempts: u64 = 0;
        let mut reported_exit = false;
        let mut rounds = interval(options.poll_interval);
        rounds.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            rounds.tick().await;
            if attempts > options.timeout_secs {
                warn!(
                    program = %self.name,
                    timeout_secs = options.timeout_secs,
                    health = %options.health,
                    "not responding"
                );
                return Err(SupervisorError::HealthTimeout {
                    script: self.name.clone(),
                    timeout_secs: options.timeout_secs,
                    output: self.captured_output(),
                });
            }

            if prober.is_alive(&options.health).await {
                info!(program = %self.name, health = %options.health, attempts, "program healthy");
                return Ok(());
            }

            if !reported_exit && self.has_exited() {
                reported_exit = true;
                warn!(program = %self.name, "program exited before passing its health check");
            }

            trace!(program = %self.name, attempts, "health check pending");
            attempts += 1;
        }
    }

    /// Drain whatever output is buffered and not yet streamed.
    pub fn captured_output(&self) -> Vec<String> {
        let mut guard = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        let mut lines = Vec::new();
        if let Some(rx) = guard.as_mut() {
            while let Ok(line) = rx.try_recv() {
                lines.push(line);
            }
        }
        lines
    }

    /// Start forwarding output to `sink`. Only the first call has an effect.
    pub fn start_multiplexer(&self, sink: Arc<dyn LogSink>) {
        let rx = self
            .output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(rx) = rx {
            let handle = output::spawn_multiplexer(self.name.clone(), self.color(), rx, sink);
            *self
                .multiplexer
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }
    }

    /// Wait for the direct child to exit.
    ///
    /// Returns `None` if the exit status could not be collected.
    pub async fn wait(&self) -> Option<ExitStatus> {
        let mut rx = self.status.clone();
        let status = rx.wait_for(|s| s.is_some()).await.ok().and_then(|s| *s);
        status
    }

    /// SIGTERM the whole process group. No-op if the group is already gone.
    pub fn kill(&self) {
        self.signal_group(Signal::SIGTERM);
    }

    /// SIGKILL the whole process group. No-op if the group is already gone.
    pub fn force_kill(&self) {
        self.signal_group(Signal::SIGKILL);
    }

    /// SIGTERM the group, give the child `grace` to exit, then SIGKILL
    /// whatever is left of the group. Only then are the pipe readers stopped
    /// and pending output flushed.
    pub async fn terminate(&self, grace: Duration) {
        self.kill();
        if timeout(grace, self.wait()).await.is_err() {
            warn!(program = %self.name, ?grace, "still running after SIGTERM; sending SIGKILL");
        }
        // Descendants that outlived the leader go too.
        self.force_kill();
        if timeout(grace, self.wait()).await.is_err() {
            warn!(program = %self.name, "process did not exit after SIGKILL");
        }
        self.shutdown.cancel();
        self.flush_output().await;
    }

    /// Wait (briefly) for the multiplexer to print the last lines.
    async fn flush_output(&self) {
        let handle = self
            .multiplexer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if timeout(OUTPUT_FLUSH_TIMEOUT, handle).await.is_err() {
                debug!(program = %self.name, "multiplexer still busy at shutdown");
            }
        }
    }

    fn signal_group(&self, signal: Signal) -> bool {
        match killpg(self.pgid, signal) {
            Ok(()) => {
                debug!(program = %self.name, pgid = self.pgid.as_raw(), signal = signal.as_str(), "signalled process group");
                true
            }
            Err(Errno::ESRCH) => {
                trace!(program = %self.name, "process group already gone");
                false
            }
            Err(e) => {
                warn!(program = %self.name, signal = signal.as_str(), error = %e, "failed to signal process group");
                false
            }
        }
    }
}

/// Own the `Child`: wait for it and publish the status.
///
/// The pipe readers are left alone. Descendants in the group may still be
/// writing; the readers end at EOF or when `terminate` cancels them.
fn spawn_reaper(name: String, mut child: Child, status_tx: watch::Sender<Option<ExitStatus>>) {
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => {
                info!(
                    program = %name,
                    exit_code = ?status.code(),
                    success = status.success(),
                    "program exited"
                );
                status_tx.send_replace(Some(status));
            }
            Err(e) => {
                warn!(program = %name, error = %e, "failed to wait for program");
            }
        }
    });
}
