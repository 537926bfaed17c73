use std::process::ExitCode;

use clap::error::ErrorKind;
use threadsd::config::{self, ConfigError};
use threadsd::lifecycle::{run_until_interrupt, CtrlC, Daemon, Outcome};
use threadsd::observability::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match config::load_config() {
        Ok(config) => config,
        Err(ConfigError::Parse(e)) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(ConfigError::Parse(e)) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("threadsd: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match logging::init(config.debug, config.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("threadsd: {e}");
            return ExitCode::FAILURE;
        }
    };
    config.log_resolved();

    let mut signals = match CtrlC::new() {
        Ok(signals) => signals,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install interrupt handler");
            return ExitCode::FAILURE;
        }
    };

    let daemon = match Daemon::start(&config).await {
        Ok(daemon) => daemon,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    println!("Welcome to Threads!");
    println!("Your peer ID is {}", daemon.peer_id());

    let outcome = run_until_interrupt(daemon, &mut signals, || std::process::exit(1)).await;
    match outcome {
        Outcome::Stopped => tracing::info!("Stopped"),
        Outcome::Forced => tracing::warn!("Forced exit"),
        Outcome::Fatal(e) => tracing::error!(error = %e, "Exiting after fatal error"),
    }
    // Interrupt-driven exits are never clean.
    ExitCode::FAILURE
}
