// src/engine/registry.rs

//! Shared, launch-ordered collection of every program started in a run.
//!
//! The main flow registers programs while the interrupt path may be killing
//! them, so all access goes through one mutex and readers work on snapshots.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::exec::Program;

#[derive(Debug, Default)]
struct RegistryInner {
    programs: Mutex<Vec<Arc<Program>>>,
    next_index: AtomicUsize,
}

/// Cheap to clone; clones share the same programs.
#[derive(Debug, Clone, Default)]
pub struct ProgramRegistry {
    inner: Arc<RegistryInner>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch index for the next program; drives its log color.
    pub fn next_launch_index(&self) -> usize {
        self.inner.next_index.fetch_add(1, Ordering::Relaxed)
    }

    pub fn register(&self, program: Arc<Program>) {
        debug!(program = %program.name(), pid = program.pid(), "registering program");
        self.lock().push(program);
    }

    /// Programs in launch order, as of now.
    pub fn snapshot(&self) -> Vec<Arc<Program>> {
        self.lock().clone()
    }

    /// SIGKILL every registered process group without waiting.
    pub fn force_kill_all(&self) {
        let programs = self.snapshot();
        info!(count = programs.len(), "force-killing all programs");
        for program in programs {
            program.force_kill();
        }
    }

    /// Terminate every registered program concurrently, each with `grace`
    /// between SIGTERM and SIGKILL.
    pub async fn terminate_all(&self, grace: Duration) {
        let mut set = JoinSet::new();
        for program in self.snapshot() {
            set.spawn(async move { program.terminate(grace).await });
        }
        while set.join_next().await.is_some() {}
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<Program>>> {
        self.inner
            .programs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
