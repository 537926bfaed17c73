use std::net::SocketAddr;

use tokio_stream::wrappers::TcpListenerStream;
use tonic::service::Routes;
use tonic::transport::Server;
use tracing::Span;

use super::RpcError;
use crate::lifecycle::supervisor::{FatalSender, ServeTask};
use crate::net::listener;

/// The gRPC listener on `apiAddr`.
pub struct RpcServer {
    local_addr: SocketAddr,
    task: ServeTask,
}

impl RpcServer {
    /// Bind `addr` and start serving `routes` in the background.
    pub async fn start(
        addr: SocketAddr,
        routes: Routes,
        fatal: FatalSender,
        span: Span,
    ) -> Result<Self, RpcError> {
        let (listener, local_addr) = listener::bind("rpc", addr).await?;
        span.in_scope(|| tracing::info!(%local_addr, "RPC server listening"));

        let task = ServeTask::spawn("rpc", fatal, span, move |stop| {
            Server::builder()
                .add_routes(routes)
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), stop.wait())
        });
        Ok(Self { local_addr, task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and wait for in-flight calls to finish.
    pub async fn stop(self) -> Result<(), RpcError> {
        self.task.stop().await?;
        Ok(())
    }
}
