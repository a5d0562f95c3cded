// tests/interrupt_behaviour.rs
mod common;
use crate::common::builders::{ConfigFileBuilder, ScriptConfigBuilder, TaskConfigBuilder};
use crate::common::{init_tracing, interrupts, pid_is_alive, supervisor, tasks, with_timeout};

use std::error::Error;
use std::path::Path;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::sleep;

use taskvisor::config::{ConfigFile, TaskConfig};
use taskvisor::engine::InterruptSignal;
use taskvisor::errors::SupervisorError;
use taskvisor::types::InterruptMode;

type TestResult = Result<(), Box<dyn Error>>;

/// A long-lived background server plus a foreground step that keeps the
/// main flow busy until it is interrupted.
fn web_task(on_interrupt: Option<&str>) -> TaskConfig {
    let mut task = TaskConfigBuilder::new("web")
        .script(
            ScriptConfigBuilder::shell("server", "echo $$; exec sleep 30")
                .background(true)
                .build(),
        )
        .script(ScriptConfigBuilder::shell("hold", "sleep 30").build());
    if let Some(target) = on_interrupt {
        task = task.on_interrupt(target);
    }
    task.build()
}

fn cleanup_task(marker: &Path) -> TaskConfig {
    TaskConfigBuilder::new("cleanup")
        .script(ScriptConfigBuilder::shell("cleaner", &format!("touch {}", marker.display())).build())
        .build()
}

/// Send `signals` after the main flow had time to launch everything.
fn send_later(tx: mpsc::Sender<InterruptSignal>, signals: Vec<InterruptSignal>) {
    tokio::spawn(async move {
        sleep(Duration::from_millis(500)).await;
        for signal in signals {
            let _ = tx.send(signal).await;
            sleep(Duration::from_millis(200)).await;
        }
    });
}

fn server_pid(sink: &crate::common::RecordingSink) -> i32 {
    sink.lines_of("server")[0].trim().parse().expect("server printed its pid")
}

async fn interrupted_run(cfg: ConfigFile, signals: Vec<InterruptSignal>) -> TestResult {
    let (sv, sink) = supervisor(cfg);
    let (tx, rx) = interrupts();
    send_later(tx, signals);

    let began = Instant::now();
    let report = with_timeout(sv.run(&tasks(&["web"]), rx)).await?;

    assert!(began.elapsed() < Duration::from_secs(15));
    assert!(report.interrupted.is_some());
    assert!(report.is_success());
    assert!(!pid_is_alive(server_pid(&sink)));
    Ok(())
}

#[tokio::test]
async fn chain_mode_runs_interrupt_tasks_then_stops_everything() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("cleaned");
    let cfg = ConfigFileBuilder::new()
        .kill_timeout(1)
        .with_task(web_task(Some("cleanup")))
        .with_task(cleanup_task(&marker))
        .build();

    interrupted_run(cfg, vec![InterruptSignal::Interrupt]).await?;
    assert!(marker.exists());
    Ok(())
}

#[tokio::test]
async fn kill_mode_skips_the_interrupt_chain() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("cleaned");
    let cfg = ConfigFileBuilder::new()
        .interrupt_mode(InterruptMode::Kill)
        .kill_timeout(1)
        .with_task(web_task(Some("cleanup")))
        .with_task(cleanup_task(&marker))
        .build();

    interrupted_run(cfg, vec![InterruptSignal::Terminate]).await?;
    assert!(!marker.exists());
    Ok(())
}

#[tokio::test]
async fn chain_mode_without_interrupt_tasks_falls_back_to_kill() -> TestResult {
    init_tracing();

    let cfg = ConfigFileBuilder::new()
        .kill_timeout(1)
        .with_task(web_task(None))
        .build();

    interrupted_run(cfg, vec![InterruptSignal::Quit]).await
}

#[tokio::test]
async fn second_signal_cuts_a_hanging_chain_short() -> TestResult {
    init_tracing();

    let cfg = ConfigFileBuilder::new()
        .kill_timeout(1)
        .with_task(web_task(Some("slow-cleanup")))
        .with_task(
            TaskConfigBuilder::new("slow-cleanup")
                .script(ScriptConfigBuilder::shell("stuck", "sleep 30").build())
                .build(),
        )
        .build();

    interrupted_run(
        cfg,
        vec![InterruptSignal::Interrupt, InterruptSignal::Interrupt],
    )
    .await
}

#[tokio::test]
async fn interrupt_targets_are_checked_before_launch() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("started");
    let cfg = ConfigFileBuilder::new()
        .with_task(
            TaskConfigBuilder::new("web")
                .on_interrupt("cleanup")
                .script(ScriptConfigBuilder::shell("starter", &format!("touch {}", marker.display())).build())
                .build(),
        )
        .with_task(
            TaskConfigBuilder::new("cleanup")
                .script(ScriptConfigBuilder::new("down", "/missing/cleanup.sh").abs_path(true).build())
                .build(),
        )
        .build();
    let (sv, _sink) = supervisor(cfg);
    let (_tx, rx) = interrupts();

    match with_timeout(sv.run(&tasks(&["web"]), rx)).await {
        Err(SupervisorError::MissingExecutable { script, .. }) => assert_eq!(script, "down"),
        other => panic!("expected MissingExecutable, got {other:?}"),
    }
    assert!(!marker.exists());
    Ok(())
}
