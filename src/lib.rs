// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::path::PathBuf;

use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_and_validate};
use crate::config::scaffold::write_starter_config;
use crate::config::ConfigFile;
use crate::engine::{Supervisor, spawn_signal_listener};
use crate::errors::Result;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - `--init` scaffolding
/// - config loading
/// - dry-run printing
/// - the supervisor, fed by the signal listener
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);

    if args.init {
        return write_starter_config(&config_path);
    }

    let cfg = load_and_validate(&config_path)?;
    info!(config = %config_path.display(), tasks = cfg.tasks.len(), "loaded config");

    if args.dry_run {
        print_dry_run(&cfg, &args.tasks);
        return Ok(());
    }

    // Relative script paths and env files resolve against the working directory.
    let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let supervisor = Supervisor::new(cfg, base_dir).quiet(args.quiet);
    let interrupts = spawn_signal_listener();

    let report = supervisor.run(&args.tasks, interrupts).await?;
    report.into_result()
}

/// Simple dry-run output: the requested tasks and the scripts they would launch.
fn print_dry_run(cfg: &ConfigFile, requested: &[String]) {
    println!("taskvisor dry-run");
    println!("  settings.interrupt_mode = {:?}", cfg.settings.interrupt_mode);
    println!("  settings.kill_timeout = {}s", cfg.settings.kill_timeout);
    println!();

    for name in requested {
        let Some(task) = cfg.task(name) else {
            println!("  - {name} (unknown, skipped)");
            continue;
        };
        println!("  - {name}");
        if let Some(ref env_file) = task.env_file {
            println!("      env_file: {env_file}");
        }
        for env in task.envs.iter() {
            println!("      env: {}={}", env.key, env.value);
        }
        if !task.on_interrupt.is_empty() {
            println!("      on_interrupt: {:?}", task.on_interrupt);
        }
        if task.wait_for_finish {
            println!("      wait_for_finish: true");
        }
        for script in task.scripts.iter() {
            println!("      script {}: {} {:?}", script.name, script.path, script.args);
            if !script.health_check.is_empty() {
                println!("        health_check: {} (timeout {}s)", script.health_check, script.timeout);
            }
            if script.bg_mode {
                println!("        bg_mode: true");
            }
            if script.ignore_error {
                println!("        ignore_error: true");
            }
            if script.sleep_after > 0 {
                println!("        sleep_after: {}s", script.sleep_after);
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
