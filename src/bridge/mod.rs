//! Browser-facing protocol bridge in front of the RPC routes.
//!
//! # Data Flow
//! ```text
//! HTTP request on apiProxyAddr
//!     → detect::classify
//!         GrpcWeb / Preflight → CORS → tonic-web → shared tonic Routes
//!         WebSocket           → websocket::session (grpc-websockets framing)
//!                                 → same CORS/tonic-web stack per call
//!         anything else       → 404
//! ```
//!
//! # Design Decisions
//! - The bridge calls the routes in process rather than proxying over TCP
//! - Origin checks always pass; this is a developer convenience, not a boundary
//! - Shutdown is bounded by a deadline, after which the task is aborted

pub mod detect;
pub mod server;
pub mod websocket;

use thiserror::Error;

use crate::net::listener::ListenerError;

pub use server::BridgeServer;

/// Shutdown deadline for the bridge listener.
pub const SHUTDOWN_DEADLINE: std::time::Duration = std::time::Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("bridge task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("keep-alive interval must be at least {min:?}, got {got:?}")]
    KeepAliveTooShort {
        got: std::time::Duration,
        min: std::time::Duration,
    },
}
