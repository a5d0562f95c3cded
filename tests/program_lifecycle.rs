// tests/program_lifecycle.rs
mod common;
use crate::common::builders::ScriptConfigBuilder;
use crate::common::{RecordingSink, init_tracing, pid_is_alive, with_timeout};

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use taskvisor::config::ScriptConfig;
use taskvisor::errors::{EXIT_HEALTH_TIMEOUT, SupervisorError};
use taskvisor::exec::{EnvOverlay, HealthCheck, HealthProber, Program, RunOptions};

type TestResult = Result<(), Box<dyn Error>>;

fn start(script: &ScriptConfig, index: usize) -> Program {
    Program::start(script, Path::new("/"), &EnvOverlay::new(), index).expect("program starts")
}

/// A port nothing listens on (bound once, then released).
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_line(sink: &RecordingSink, program: &str) -> String {
    with_timeout(async {
        loop {
            if let Some(line) = sink.lines_of(program).into_iter().next() {
                return line;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
}

#[tokio::test]
async fn no_health_check_is_healthy_immediately() -> TestResult {
    init_tracing();

    let script = ScriptConfigBuilder::shell("idle", "sleep 30")
        .background(true)
        .timeout(0)
        .build();
    let program = start(&script, 0);
    let options = RunOptions::from_script(&script)?;
    assert_eq!(options.health, HealthCheck::Immediate);

    let began = Instant::now();
    program
        .run(&options, &HealthProber::new()?, Arc::new(RecordingSink::new()))
        .await?;
    assert!(began.elapsed() < Duration::from_millis(500));
    assert!(!program.has_exited());

    program.terminate(Duration::from_secs(2)).await;
    assert!(program.has_exited());
    Ok(())
}

#[tokio::test]
async fn missing_executable_is_rejected_at_start() {
    let script = ScriptConfigBuilder::new("ghost", "/definitely/not/here")
        .abs_path(true)
        .build();
    match Program::start(&script, Path::new("/"), &EnvOverlay::new(), 0) {
        Err(SupervisorError::MissingExecutable { script, path }) => {
            assert_eq!(script, "ghost");
            assert_eq!(path, Path::new("/definitely/not/here"));
        }
        other => panic!("expected MissingExecutable, got {other:?}"),
    }
}

#[tokio::test]
async fn foreground_run_blocks_until_exit_and_streams_output() -> TestResult {
    init_tracing();

    let script = ScriptConfigBuilder::shell("greeter", "echo hello; echo oops >&2; exit 4").build();
    let program = start(&script, 3);
    let sink = Arc::new(RecordingSink::new());

    program
        .run(&RunOptions::from_script(&script)?, &HealthProber::new()?, sink.clone())
        .await?;

    let status = program.exit_status().expect("foreground run waits for exit");
    assert_eq!(status.code(), Some(4));

    program.terminate(Duration::from_secs(1)).await;
    let mut lines = sink.lines_of("greeter");
    lines.sort();
    assert_eq!(lines, vec!["hello".to_string(), "oops".to_string()]);
    assert_eq!(sink.color_of("greeter"), Some(program.color()));
    Ok(())
}

#[tokio::test]
async fn kill_is_idempotent_after_exit() -> TestResult {
    let script = ScriptConfigBuilder::shell("quick", "exit 0").build();
    let program = start(&script, 0);

    let status = with_timeout(program.wait()).await;
    assert!(status.is_some_and(|s| s.success()));

    program.kill();
    program.kill();
    program.force_kill();
    with_timeout(program.terminate(Duration::from_secs(1))).await;
    with_timeout(program.terminate(Duration::from_secs(1))).await;
    assert!(program.exit_status().is_some_and(|s| s.success()));
    Ok(())
}

#[tokio::test]
async fn concurrent_kills_do_not_interfere() -> TestResult {
    let script = ScriptConfigBuilder::shell("sleeper", "sleep 30").background(true).build();
    let program = Arc::new(start(&script, 0));

    let a = {
        let p = Arc::clone(&program);
        tokio::spawn(async move { p.terminate(Duration::from_secs(2)).await })
    };
    let b = {
        let p = Arc::clone(&program);
        tokio::spawn(async move { p.force_kill() })
    };
    a.await?;
    b.await?;
    assert!(program.has_exited());
    Ok(())
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn terminate_takes_down_the_whole_process_group() -> TestResult {
    init_tracing();

    let script = ScriptConfigBuilder::shell("parent", "sleep 60 & echo $!; wait")
        .background(true)
        .build();
    let program = start(&script, 0);
    let sink = Arc::new(RecordingSink::new());
    program
        .run(&RunOptions::from_script(&script)?, &HealthProber::new()?, sink.clone())
        .await?;

    let grandchild: i32 = wait_for_line(&sink, "parent").await.trim().parse()?;
    assert!(pid_is_alive(grandchild));

    program.terminate(Duration::from_secs(2)).await;

    with_timeout(async {
        while pid_is_alive(grandchild) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    Ok(())
}

#[tokio::test]
async fn unreachable_http_endpoint_times_out_with_captured_output() -> TestResult {
    init_tracing();

    let port = closed_port().await;
    let script = ScriptConfigBuilder::shell("web", "echo starting; sleep 30")
        .background(true)
        .health_check(&format!("http://127.0.0.1:{port}/health"))
        .timeout(2)
        .build();
    let program = start(&script, 0);
    let options = RunOptions::from_script(&script)?.with_poll_interval(Duration::from_millis(300));

    let err = program
        .run(&options, &HealthProber::new()?, Arc::new(RecordingSink::new()))
        .await
        .expect_err("nothing listens on the port");

    match &err {
        SupervisorError::HealthTimeout {
            script,
            timeout_secs,
            output,
        } => {
            assert_eq!(script, "web");
            assert_eq!(*timeout_secs, 2);
            assert_eq!(output, &vec!["starting".to_string()]);
        }
        other => panic!("expected HealthTimeout, got {other:?}"),
    }
    assert_eq!(err.exit_code(), EXIT_HEALTH_TIMEOUT);

    program.terminate(Duration::from_secs(2)).await;
    Ok(())
}

#[tokio::test]
async fn tcp_health_check_waits_for_the_port() -> TestResult {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    let script = ScriptConfigBuilder::shell("db", "sleep 30")
        .background(true)
        .health_check(&format!("tcp://127.0.0.1:{port}"))
        .timeout(5)
        .build();
    let program = start(&script, 1);
    let options = RunOptions::from_script(&script)?.with_poll_interval(Duration::from_millis(50));

    program
        .run(&options, &HealthProber::new()?, Arc::new(RecordingSink::new()))
        .await?;
    program.terminate(Duration::from_secs(2)).await;
    Ok(())
}

#[tokio::test]
async fn http_error_status_still_counts_as_alive() -> TestResult {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}/health", listener.local_addr()?);

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await;
        socket
            .write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
    });

    let prober = HealthProber::new()?;
    assert!(prober.is_alive(&HealthCheck::Http(url)).await);
    server.await?;
    Ok(())
}

#[tokio::test]
async fn slow_probes_do_not_stretch_the_health_window() -> TestResult {
    init_tracing();

    // Accepts connections but never answers, so every HTTP probe runs into
    // its own timeout.
    let silent = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}/health", silent.local_addr()?);

    let script = ScriptConfigBuilder::shell("web", "sleep 30")
        .background(true)
        .health_check(&url)
        .timeout(2)
        .build();
    let program = start(&script, 0);
    let options = RunOptions::from_script(&script)?;

    let began = Instant::now();
    let err = program
        .run(&options, &HealthProber::new()?, Arc::new(RecordingSink::new()))
        .await
        .expect_err("the endpoint never answers");
    let elapsed = began.elapsed();

    assert!(matches!(err, SupervisorError::HealthTimeout { .. }));
    assert!(elapsed >= Duration::from_secs(2), "gave up after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(4500), "took {elapsed:?}");

    program.terminate(Duration::from_secs(2)).await;
    drop(silent);
    Ok(())
}
