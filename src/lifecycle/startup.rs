//! Startup orchestration.
//!
//! # Responsibilities
//! - Bring components up in dependency order: storage, host, rpc, then
//!   bridge and gateway together
//! - Close whatever already started when a later step fails
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)
//! - The host owns closing the datastore once it exists

use std::net::SocketAddr;
use std::sync::Arc;

use libp2p::{Multiaddr, PeerId};
use thiserror::Error;
use tokio::sync::watch;
use tracing::Instrument;

use super::shutdown::{LifecycleState, ShutdownError, ShutdownSequence, StateCell};
use super::supervisor::{fatal_channel, FatalReceiver, ServeError};
#[cfg(test)]
use super::supervisor::FatalSender;
use crate::bridge::{self, BridgeError, BridgeServer};
use crate::config::ResolvedConfig;
use crate::db::Manager;
use crate::gateway::{Gateway, GatewayError};
use crate::observability::component_span;
use crate::p2p::{HostConfig, HostError, NetworkHost};
use crate::rpc::{self, RpcError, RpcServer};
use crate::storage::{self, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("opening datastore: {0}")]
    Store(#[from] StoreError),

    #[error("starting network host: {0}")]
    Host(#[from] HostError),

    #[error("starting rpc server: {0}")]
    Rpc(#[from] RpcError),

    #[error("starting bridge: {0}")]
    Bridge(#[from] BridgeError),

    #[error("starting gateway: {0}")]
    Gateway(#[from] GatewayError),
}

/// Addresses every component actually bound.
#[derive(Debug, Clone)]
pub struct BoundAddrs {
    pub host: Vec<Multiaddr>,
    pub rpc: SocketAddr,
    pub bridge: SocketAddr,
    pub gateway: SocketAddr,
}

/// All running components.
pub struct Daemon {
    host: Arc<NetworkHost>,
    rpc: RpcServer,
    bridge: BridgeServer,
    gateway: Gateway,
    addrs: BoundAddrs,
    fatal: FatalReceiver,
    #[cfg(test)]
    injector: FatalSender,
    state: StateCell,
}

impl Daemon {
    /// Start every component; on failure, close the ones already running.
    pub async fn start(config: &ResolvedConfig) -> Result<Self, StartupError> {
        let store = storage::open_backend(&config.storage)
            .instrument(component_span("storage"))
            .await?;

        let host = match NetworkHost::start(
            HostConfig::from_resolved(config),
            store.clone(),
            component_span("host"),
        )
        .await
        {
            Ok(host) => Arc::new(host),
            Err(e) => {
                if let Err(close_err) = store.close().await {
                    tracing::warn!(error = %close_err, "Failed to close datastore after startup error");
                }
                return Err(e.into());
            }
        };
        let host_addrs = match host.listen_addrs().await {
            Ok(addrs) => addrs,
            Err(e) => return Err(rollback(e.into(), None, &host).await),
        };

        let manager = Arc::new(Manager::new(store));
        let routes = rpc::routes(manager.clone(), host.clone());
        let (fatal_tx, fatal) = fatal_channel();

        let rpc = match RpcServer::start(
            config.api_addr,
            routes.clone(),
            fatal_tx.clone(),
            component_span("rpc"),
        )
        .await
        {
            Ok(rpc) => rpc,
            Err(e) => return Err(rollback(e.into(), None, &host).await),
        };

        #[cfg(test)]
        let injector = fatal_tx.clone();
        let (bridge, gateway) = tokio::join!(
            BridgeServer::start(
                config.api_proxy_addr,
                routes,
                config.keep_alive_interval,
                fatal_tx.clone(),
                component_span("bridge"),
            ),
            Gateway::start(
                manager,
                &config.gateway_addr,
                config.gateway_url.clone(),
                config.gateway_subdomains,
                fatal_tx,
                component_span("gateway"),
            ),
        );
        let (bridge, gateway) = match (bridge, gateway) {
            (Ok(bridge), Ok(gateway)) => (bridge, gateway),
            (Ok(bridge), Err(e)) => {
                if let Err(stop_err) = bridge.shutdown(bridge::SHUTDOWN_DEADLINE).await {
                    tracing::warn!(error = %stop_err, "Failed to stop bridge after startup error");
                }
                return Err(rollback(e.into(), Some(rpc), &host).await);
            }
            (Err(e), Ok(gateway)) => {
                if let Err(close_err) = gateway.close().await {
                    tracing::warn!(error = %close_err, "Failed to close gateway after startup error");
                }
                return Err(rollback(e.into(), Some(rpc), &host).await);
            }
            (Err(e), Err(gateway_err)) => {
                tracing::error!(error = %gateway_err, "Gateway also failed to start");
                return Err(rollback(e.into(), Some(rpc), &host).await);
            }
        };

        let addrs = BoundAddrs {
            host: host_addrs,
            rpc: rpc.local_addr(),
            bridge: bridge.local_addr(),
            gateway: gateway.local_addr(),
        };
        tracing::info!(peer_id = %host.peer_id(), ?addrs, "Daemon started");

        Ok(Self {
            host,
            rpc,
            bridge,
            gateway,
            addrs,
            fatal,
            #[cfg(test)]
            injector,
            state: StateCell::new(),
        })
    }

    pub fn peer_id(&self) -> PeerId {
        self.host.peer_id()
    }

    pub fn addrs(&self) -> &BoundAddrs {
        &self.addrs
    }

    pub fn state(&self) -> watch::Receiver<LifecycleState> {
        self.state.watch()
    }

    /// Resolve with the first unexpected serve error.
    pub async fn serve_error(&mut self) -> ServeError {
        match self.fatal.recv().await {
            Some(err) => err,
            // Every serve task is gone without reporting; nothing left to fail.
            None => std::future::pending().await,
        }
    }

    /// Report `err` as if a listener had failed.
    #[cfg(test)]
    pub(crate) fn inject_serve_error(&self, err: ServeError) {
        let _ = self.injector.send(err);
    }

    /// Close the gateway, the bridge (bounded), the rpc server, then the host.
    pub async fn shutdown(self) -> Result<(), ShutdownError> {
        self.state.begin_stopping();
        let Daemon {
            host,
            rpc,
            bridge,
            gateway,
            ..
        } = self;

        ShutdownSequence::new()
            .step("gateway", async move { gateway.close().await.map_err(ShutdownError::from) })
            .step("bridge", async move {
                bridge
                    .shutdown(bridge::SHUTDOWN_DEADLINE)
                    .await
                    .map(|_within_deadline| ())
                    .map_err(ShutdownError::from)
            })
            .step("rpc", async move { rpc.stop().await.map_err(ShutdownError::from) })
            .step("host", async move { host.close().await.map_err(ShutdownError::from) })
            .run()
            .await
    }
}

/// Stop the rpc server if running, close the host, and hand back `err`.
async fn rollback(err: StartupError, rpc: Option<RpcServer>, host: &NetworkHost) -> StartupError {
    tracing::error!(error = %err, "Startup failed, closing started components");
    if let Some(rpc) = rpc {
        if let Err(e) = rpc.stop().await {
            tracing::warn!(error = %e, "Failed to stop rpc server during rollback");
        }
    }
    if let Err(e) = host.close().await {
        tracing::warn!(error = %e, "Failed to close network host during rollback");
    }
    err
}
