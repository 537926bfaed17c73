//! RPC service registrar.
//!
//! # Data Flow
//! ```text
//! Manager ──→ DataApi ──┐
//!                       ├─→ Routes ──→ tonic Server on apiAddr
//! NetworkHost → NetApi ─┘        └───→ bridge (same routes, in process)
//! ```
//!
//! # Design Decisions
//! - Service stubs are generated at build time from hand-written prost messages
//! - Both services share one listener and one set of routes
//! - Graceful stop waits for in-flight calls with no deadline

pub mod data_service;
pub mod net_service;
pub mod proto;
pub mod server;

use std::sync::Arc;

use thiserror::Error;
use tonic::service::Routes;

use crate::db::Manager;
use crate::net::listener::ListenerError;
use crate::p2p::NetworkHost;

pub use data_service::DataApi;
pub use net_service::NetApi;
pub use server::RpcServer;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("rpc transport: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("rpc server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Register both services on one route table.
pub fn routes(manager: Arc<Manager>, host: Arc<NetworkHost>) -> Routes {
    Routes::new(proto::data_service_server::DataServiceServer::new(DataApi::new(manager)))
        .add_service(proto::net_service_server::NetServiceServer::new(NetApi::new(host)))
}
