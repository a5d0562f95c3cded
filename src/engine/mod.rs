// src/engine/mod.rs

//! Orchestration engine for taskvisor.
//!
//! This module ties together:
//! - the task runner (scripts of one task, in order)
//! - the shared program registry
//! - the interrupt coordinator (signals → kill or fallback chain)
//! - the top-level supervisor that resolves requested tasks, waits where
//!   asked to, and aggregates exit status

pub mod interrupt;
pub mod registry;
pub mod runner;
pub mod supervisor;

pub use crate::types::{InterruptMode, InterruptSignal};
pub use interrupt::{InterruptCoordinator, chained_tasks, next_interrupt, spawn_signal_listener};
pub use registry::ProgramRegistry;
pub use runner::{TaskRun, TaskRunner};
pub use supervisor::{RunReport, Supervisor};
