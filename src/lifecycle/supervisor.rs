//! Background serve tasks and fatal serve-error reporting.
//!
//! Every listener runs inside a [`ServeTask`]. When its serve future
//! returns, the outcome is classified: anything after the task's own stop
//! request is intentional, anything before it is reported to the
//! coordinator as a [`ServeError`].

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, Span};

/// An unexpected serve-time failure of a background listener.
#[derive(Debug, Clone, Error)]
#[error("{component} serve error: {message}")]
pub struct ServeError {
    pub component: &'static str,
    pub message: String,
}

pub type FatalSender = mpsc::UnboundedSender<ServeError>;
pub type FatalReceiver = mpsc::UnboundedReceiver<ServeError>;

pub fn fatal_channel() -> (FatalSender, FatalReceiver) {
    mpsc::unbounded_channel()
}

/// Resolves once the owning [`ServeTask`] asks its server to stop.
pub struct StopSignal(oneshot::Receiver<()>);

impl StopSignal {
    pub async fn wait(self) {
        // A dropped sender also means stop.
        let _ = self.0.await;
    }
}

pub struct ServeTask {
    component: &'static str,
    stop_requested: Arc<AtomicBool>,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl ServeTask {
    /// Spawn `serve` on its own task, instrumented with `span`.
    pub fn spawn<F, Fut, E>(component: &'static str, fatal: FatalSender, span: Span, serve: F) -> Self
    where
        F: FnOnce(StopSignal) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let (stop, rx) = oneshot::channel();
        let stop_requested = Arc::new(AtomicBool::new(false));
        let flag = stop_requested.clone();
        let serving = serve(StopSignal(rx));

        let handle = tokio::spawn(
            async move {
                let result = serving.await;
                let intentional = flag.load(Ordering::SeqCst);
                let message = match result {
                    Ok(()) if intentional => {
                        tracing::debug!(component, "Server stopped");
                        return;
                    }
                    Err(e) if intentional => {
                        tracing::debug!(component, error = %e, "Server returned after stop request");
                        return;
                    }
                    Ok(()) => "server exited without a stop request".to_string(),
                    Err(e) => e.to_string(),
                };
                tracing::error!(component, error = %message, "Serve error");
                // The coordinator may already be gone during teardown.
                let _ = fatal.send(ServeError { component, message });
            }
            .instrument(span),
        );

        Self {
            component,
            stop_requested,
            stop: Some(stop),
            handle,
        }
    }

    /// Mark the task as stopping and signal its server.
    pub fn request_stop(&mut self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Stop and wait for the server to finish, however long that takes.
    pub async fn stop(mut self) -> Result<(), JoinError> {
        self.request_stop();
        self.handle.await
    }

    /// Stop and wait up to `deadline`, aborting the task past it.
    ///
    /// Returns `false` when the deadline forced the abort.
    pub async fn stop_within(mut self, deadline: Duration) -> Result<bool, JoinError> {
        self.request_stop();
        match tokio::time::timeout(deadline, &mut self.handle).await {
            Ok(joined) => joined.map(|()| true),
            Err(_) => {
                self.handle.abort();
                tracing::warn!(component = self.component, ?deadline, "Shutdown deadline exceeded, aborting");
                Ok(false)
            }
        }
    }
}
