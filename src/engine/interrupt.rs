// src/engine/interrupt.rs

//! Reaction to termination signals.
//!
//! A listener task forwards SIGINT / SIGTERM / SIGQUIT into a channel for the
//! whole lifetime of the run. The orchestrator races that channel against the
//! main flow; once a signal wins, [`InterruptCoordinator::handle`] either
//! force-kills everything or runs the fallback tasks declared in
//! `OnInterrupt`.

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{ConfigFile, TaskConfig};
use crate::engine::registry::ProgramRegistry;
use crate::engine::runner::TaskRunner;
use crate::errors::Result;
use crate::types::{InterruptMode, InterruptSignal};

/// Install handlers for SIGINT, SIGTERM and SIGQUIT and forward every
/// received signal.
///
/// The handlers are in place when this returns, so nothing spawned afterwards
/// can outlive a supervisor killed by a default signal disposition. If they
/// cannot be installed the channel is closed, and [`next_interrupt`] never
/// resolves. Must be called inside a Tokio runtime.
pub fn spawn_signal_listener() -> mpsc::Receiver<InterruptSignal> {
    let (tx, rx) = mpsc::channel(4);
    let (mut int, mut term, mut quit) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    ) {
        (Ok(int), Ok(term), Ok(quit)) => (int, term, quit),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            warn!(error = %e, "failed to install signal handlers; interrupts are not coordinated");
            return rx;
        }
    };

    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = int.recv() => InterruptSignal::Interrupt,
                Some(()) = term.recv() => InterruptSignal::Terminate,
                Some(()) = quit.recv() => InterruptSignal::Quit,
                else => break,
            };
            info!(signal = received.label(), "received signal");
            if tx.send(received).await.is_err() {
                break;
            }
        }
    });
    rx
}

/// Next signal from `rx`; pends forever once the listener is gone.
pub async fn next_interrupt(rx: &mut mpsc::Receiver<InterruptSignal>) -> InterruptSignal {
    match rx.recv().await {
        Some(signal) => signal,
        None => std::future::pending().await,
    }
}

/// Tasks to run when `started` tasks are interrupted: every name in their
/// `OnInterrupt` lists, in order, without duplicates.
pub fn chained_tasks<'a>(config: &'a ConfigFile, started: &[String]) -> Vec<&'a TaskConfig> {
    let mut chain: Vec<&TaskConfig> = Vec::new();
    for name in started.iter() {
        let Some(task) = config.task(name) else {
            continue;
        };
        for chained in task.on_interrupt.iter() {
            if chain.iter().any(|t| &t.name == chained) {
                continue;
            }
            if let Some(target) = config.task(chained) {
                chain.push(target);
            }
        }
    }
    chain
}

pub struct InterruptCoordinator<'a> {
    config: &'a ConfigFile,
    runner: &'a TaskRunner,
    registry: &'a ProgramRegistry,
}

impl<'a> InterruptCoordinator<'a> {
    pub fn new(
        config: &'a ConfigFile,
        runner: &'a TaskRunner,
        registry: &'a ProgramRegistry,
    ) -> Self {
        Self {
            config,
            runner,
            registry,
        }
    }

    /// Apply the configured interrupt behaviour. `started` lists the tasks
    /// the main flow had begun when the signal arrived.
    ///
    /// The caller still terminates every registered program afterwards.
    pub async fn handle(&self, signal: InterruptSignal, started: &[String]) -> Result<()> {
        let chain = match self.config.settings.interrupt_mode {
            InterruptMode::Kill => Vec::new(),
            InterruptMode::Chain => chained_tasks(self.config, started),
        };

        if chain.is_empty() {
            info!(signal = signal.label(), "interrupted; killing all programs");
            self.registry.force_kill_all();
            return Ok(());
        }

        let names: Vec<&str> = chain.iter().map(|t| t.name.as_str()).collect();
        info!(signal = signal.label(), chain = ?names, "interrupted; running interrupt chain");
        for task in chain {
            let run = self.runner.run(task).await?;
            if task.wait_for_finish {
                run.wait_for_background().await;
            }
        }
        Ok(())
    }
}
