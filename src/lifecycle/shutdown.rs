//! Shutdown coordination for the daemon.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{broadcast, watch};

use crate::bridge::BridgeError;
use crate::gateway::GatewayError;
use crate::p2p::HostError;
use crate::rpc::RpcError;

/// Broadcasts a one-time stop notice to long-lived sessions.
///
/// Serve tasks stop through their own [`ServeTask`](super::supervisor::ServeTask);
/// this reaches work that outlives a listener, such as upgraded websockets.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// The daemon's two lifecycle states. `Stopping` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    Stopping,
}

/// Publishes lifecycle transitions on a watch channel.
pub struct StateCell {
    tx: watch::Sender<LifecycleState>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Running);
        Self { tx }
    }

    pub fn watch(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Move to `Stopping`. Returns `false` if already stopping.
    pub fn begin_stopping(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == LifecycleState::Stopping {
                return false;
            }
            *state = LifecycleState::Stopping;
            true
        })
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("closing gateway: {0}")]
    Gateway(#[from] GatewayError),

    #[error("stopping bridge: {0}")]
    Bridge(#[from] BridgeError),

    #[error("stopping rpc server: {0}")]
    Rpc(#[from] RpcError),

    #[error("closing network host: {0}")]
    Host(#[from] HostError),
}

type StepFuture = Pin<Box<dyn Future<Output = Result<(), ShutdownError>> + Send>>;

/// Named shutdown steps run strictly one after another.
pub struct ShutdownSequence {
    steps: Vec<(&'static str, StepFuture)>,
}

impl ShutdownSequence {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step. Nothing runs until [`run`](Self::run).
    pub fn step<F>(mut self, name: &'static str, step: F) -> Self
    where
        F: Future<Output = Result<(), ShutdownError>> + Send + 'static,
    {
        self.steps.push((name, Box::pin(step)));
        self
    }

    /// Run every step in order, stopping at the first error.
    pub async fn run(self) -> Result<(), ShutdownError> {
        let started = Instant::now();
        for (name, step) in self.steps {
            let step_started = Instant::now();
            tracing::info!(step = name, "Shutting down");
            if let Err(e) = step.await {
                tracing::error!(step = name, error = %e, "Shutdown step failed");
                return Err(e);
            }
            tracing::info!(step = name, elapsed = ?step_started.elapsed(), "Shutdown step complete");
        }
        tracing::info!(elapsed = ?started.elapsed(), "Shutdown complete");
        Ok(())
    }
}

impl Default for ShutdownSequence {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str, delay_ms: u64) -> impl Future<Output = Result<(), ShutdownError>> + Send + 'static {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(format!("{name}:start"));
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            log.lock().unwrap().push(format!("{name}:end"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn steps_never_overlap() {
        let log = Arc::new(Mutex::new(Vec::new()));
        ShutdownSequence::new()
            .step("gateway", recorder(&log, "gateway", 30))
            .step("bridge", recorder(&log, "bridge", 10))
            .step("rpc", recorder(&log, "rpc", 20))
            .step("host", recorder(&log, "host", 0))
            .run()
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "gateway:start", "gateway:end", "bridge:start", "bridge:end",
                "rpc:start", "rpc:end", "host:start", "host:end",
            ]
        );
    }

    #[tokio::test]
    async fn failed_step_aborts_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let result = ShutdownSequence::new()
            .step("host", async { Err(ShutdownError::Host(HostError::Closed)) })
            .step("after", recorder(&log, "after", 0))
            .run()
            .await;

        assert!(matches!(result, Err(ShutdownError::Host(_))));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn stopping_is_terminal() {
        let state = StateCell::new();
        let watcher = state.watch();
        assert_eq!(*watcher.borrow(), LifecycleState::Running);
        assert!(state.begin_stopping());
        assert!(!state.begin_stopping());
        assert_eq!(*watcher.borrow(), LifecycleState::Stopping);
    }

    #[tokio::test]
    async fn subscribers_see_trigger() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        shutdown.trigger();
        rx.recv().await.unwrap();
    }
}
