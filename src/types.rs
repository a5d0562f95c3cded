use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What the supervisor does when it receives a termination signal.
///
/// - `Chain`: run the tasks listed in `OnInterrupt` of every started task,
///   then shut everything down (default). Falls back to `Kill` when no
///   started task declares a chain.
/// - `Kill`: force-kill every running program group immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterruptMode {
    #[default]
    Chain,
    Kill,
}

impl FromStr for InterruptMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chain" => Ok(InterruptMode::Chain),
            "kill" => Ok(InterruptMode::Kill),
            other => Err(format!(
                "invalid InterruptMode: {other} (expected \"chain\" or \"kill\")"
            )),
        }
    }
}

/// Termination signals the supervisor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptSignal {
    Interrupt,
    Terminate,
    Quit,
}

impl InterruptSignal {
    pub fn label(&self) -> &'static str {
        match self {
            InterruptSignal::Interrupt => "SIGINT",
            InterruptSignal::Terminate => "SIGTERM",
            InterruptSignal::Quit => "SIGQUIT",
        }
    }
}
