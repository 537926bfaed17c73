//! Interrupt-driven run loop.
//!
//! ```text
//! Running ──interrupt──→ Stopping ──sequence done──→ Outcome::Stopped
//!    │                      └──second interrupt──→ on_force, Outcome::Forced
//!    └──serve error──→ Outcome::Fatal
//! ```

use thiserror::Error;

use super::shutdown::ShutdownError;
use super::signals::InterruptSource;
use super::startup::Daemon;
use super::supervisor::ServeError;

pub const STOPPING_NOTICE: &str = "Gracefully stopping... (press Ctrl+C again to force)";

#[derive(Debug, Error)]
pub enum FatalError {
    #[error(transparent)]
    Serve(#[from] ServeError),

    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// How the daemon stopped. The binary exits 1 for every variant.
#[derive(Debug)]
pub enum Outcome {
    /// The ordered shutdown ran to completion.
    Stopped,
    /// A second interrupt cut the shutdown short.
    Forced,
    /// A listener failed unexpectedly, or a shutdown step failed.
    Fatal(FatalError),
}

/// Serve until the first interrupt, then run the ordered shutdown.
///
/// A second interrupt during shutdown calls `on_force` (process exit in
/// production) and abandons the remaining steps.
pub async fn run_until_interrupt<S, F>(mut daemon: Daemon, signals: &mut S, on_force: F) -> Outcome
where
    S: InterruptSource,
    F: FnOnce(),
{
    tokio::select! {
        _ = signals.interrupted() => {}
        err = daemon.serve_error() => {
            tracing::error!(component = err.component, error = %err.message, "Fatal serve error");
            return Outcome::Fatal(err.into());
        }
    }

    println!("{STOPPING_NOTICE}");
    tracing::info!("Interrupt received, stopping");

    tokio::select! {
        result = daemon.shutdown() => match result {
            Ok(()) => Outcome::Stopped,
            Err(e) => Outcome::Fatal(e.into()),
        },
        _ = signals.interrupted() => {
            tracing::warn!("Second interrupt, forcing exit");
            on_force();
            Outcome::Forced
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    struct NoInterrupts;

    #[async_trait]
    impl InterruptSource for NoInterrupts {
        async fn interrupted(&mut self) {
            std::future::pending::<()>().await;
        }
    }

    async fn start(repo: &TempDir) -> Daemon {
        let config = load_config_from([
            "threadsd".to_string(),
            "--hostAddr=/ip4/127.0.0.1/tcp/0".to_string(),
            "--apiAddr=/ip4/127.0.0.1/tcp/0".to_string(),
            "--apiProxyAddr=/ip4/127.0.0.1/tcp/0".to_string(),
            "--gatewayAddr=127.0.0.1:0".to_string(),
            format!("--badgerRepo={}", repo.path().display()),
        ])
        .unwrap();
        Daemon::start(&config).await.unwrap()
    }

    #[tokio::test]
    async fn serve_error_ends_the_run_as_fatal() {
        let repo = TempDir::new().unwrap();
        let daemon = start(&repo).await;
        daemon.inject_serve_error(ServeError {
            component: "gateway",
            message: "listener died".to_string(),
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            run_until_interrupt(daemon, &mut NoInterrupts, || panic!("no interrupt was sent")),
        )
        .await
        .unwrap();

        match outcome {
            Outcome::Fatal(FatalError::Serve(err)) => {
                assert_eq!(err.component, "gateway");
                assert_eq!(err.message, "listener died");
            }
            other => panic!("expected a fatal serve error, got {other:?}"),
        }
    }
}
