// src/main.rs

use taskvisor::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("taskvisor error: {err:?}");
        std::process::exit(taskvisor::errors::EXIT_FAILURE);
    }

    if let Err(err) = run(args).await {
        eprintln!("taskvisor error: {err}");
        std::process::exit(err.exit_code());
    }
}
