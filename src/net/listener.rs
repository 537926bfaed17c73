//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind each service to its resolved address
//! - Report the actually bound address (ephemeral ports)
//! - Tag bind failures with the service that failed

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use super::addr::HostPort;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("{service}: failed to bind {addr}: {source}")]
    Bind {
        service: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Failed to resolve a host name.
    #[error("{service}: failed to resolve {addr}: {source}")]
    Resolve {
        service: &'static str,
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Resolve a `host:port` bind target.
pub async fn resolve(service: &'static str, addr: &HostPort) -> Result<SocketAddr, ListenerError> {
    addr.resolve().await.map_err(|source| ListenerError::Resolve {
        service,
        addr: addr.to_string(),
        source,
    })
}

/// Bind a TCP listener and log the bound address.
pub async fn bind(service: &'static str, addr: SocketAddr) -> Result<(TcpListener, SocketAddr), ListenerError> {
    let bind_err = |source| ListenerError::Bind { service, addr, source };

    let listener = TcpListener::bind(addr).await.map_err(bind_err)?;
    let local_addr = listener.local_addr().map_err(bind_err)?;

    tracing::info!(
        service,
        address = %local_addr,
        "Listener bound"
    );

    Ok((listener, local_addr))
}
