#![allow(dead_code)]

pub use taskvisor_test_utils::builders;
pub use taskvisor_test_utils::recording_sink::RecordingSink;
pub use taskvisor_test_utils::{init_tracing, pid_is_alive, with_timeout};

use std::sync::Arc;

use tokio::sync::mpsc;

use taskvisor::config::ConfigFile;
use taskvisor::engine::{InterruptSignal, Supervisor};

/// Supervisor rooted at `/` that records output into the returned sink.
pub fn supervisor(cfg: ConfigFile) -> (Supervisor, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let supervisor = Supervisor::new(cfg, std::path::PathBuf::from("/")).with_sink(sink.clone());
    (supervisor, sink)
}

/// An interrupt channel that stays silent unless the sender is used.
pub fn interrupts() -> (mpsc::Sender<InterruptSignal>, mpsc::Receiver<InterruptSignal>) {
    mpsc::channel(4)
}

/// `requested` as owned strings.
pub fn tasks(requested: &[&str]) -> Vec<String> {
    requested.iter().map(|s| s.to_string()).collect()
}
