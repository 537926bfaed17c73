//! Interrupt handling.
//!
//! # Responsibilities
//! - Deliver process interrupts to the coordinator
//! - Let tests substitute their own interrupt source
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - One listener for the process lifetime, so an interrupt that arrives
//!   between two waits is queued rather than lost
//! - The first interrupt starts the ordered shutdown; a second one forces exit

use async_trait::async_trait;

/// A stream of interrupt notifications.
#[async_trait]
pub trait InterruptSource: Send {
    /// Resolve on the next interrupt.
    async fn interrupted(&mut self);
}

/// Ctrl+C (SIGINT) from the operating system.
#[derive(Debug)]
pub struct CtrlC {
    #[cfg(unix)]
    signal: tokio::signal::unix::Signal,
    #[cfg(not(unix))]
    signal: tokio::signal::windows::CtrlC,
}

impl CtrlC {
    /// Install the interrupt listener. Must run inside a Tokio runtime.
    pub fn new() -> std::io::Result<Self> {
        #[cfg(unix)]
        let signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
        #[cfg(not(unix))]
        let signal = tokio::signal::windows::ctrl_c()?;
        Ok(Self { signal })
    }
}

#[async_trait]
impl InterruptSource for CtrlC {
    async fn interrupted(&mut self) {
        if self.signal.recv().await.is_none() {
            // The driver is gone; no interrupt can ever arrive.
            tracing::error!("Interrupt listener closed");
            std::future::pending::<()>().await;
        }
    }
}
