use std::collections::HashMap;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use libp2p::swarm::dial_opts::DialOpts;
use libp2p::swarm::{ConnectionId, SwarmEvent};
use libp2p::{identify, Multiaddr, PeerId};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, Span};

use super::behaviour::{build_swarm, HostBehaviourEvent, HostSwarm};
use super::{bootstrap, identity, ConnManager, HostError, NET_NAMESPACE};
use crate::config::{ConnLimits, ResolvedConfig};
use crate::storage::{Datastore, Key, Namespaced, StoreHandle};

const LISTEN_TIMEOUT: Duration = Duration::from_secs(10);
const PRUNE_INTERVAL: Duration = Duration::from_secs(10);
const COMMAND_BUFFER: usize = 64;

/// Settings for [`NetworkHost::start`].
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub listen_addr: Multiaddr,
    pub conn_limits: ConnLimits,
    pub enable_pubsub: bool,
    pub bootstrap: Vec<Multiaddr>,
}

impl HostConfig {
    /// Host settings from daemon configuration, with the default bootstrap peers.
    pub fn from_resolved(config: &ResolvedConfig) -> Self {
        Self {
            listen_addr: config.host_addr.clone(),
            conn_limits: config.conn_limits,
            enable_pubsub: config.enable_net_pubsub,
            bootstrap: bootstrap::default_peers(),
        }
    }
}

/// A connected peer and the remote address of its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub id: PeerId,
    pub addrs: Vec<Multiaddr>,
}

enum Command {
    Dial {
        addr: Multiaddr,
        reply: oneshot::Sender<Result<PeerId, HostError>>,
    },
    Peers {
        reply: oneshot::Sender<Vec<PeerInfo>>,
    },
    ListenAddrs {
        reply: oneshot::Sender<Vec<Multiaddr>>,
    },
    Shutdown,
}

/// Handle to the running peer-to-peer host.
pub struct NetworkHost {
    peer_id: PeerId,
    commands: mpsc::Sender<Command>,
    driver: Mutex<Option<JoinHandle<()>>>,
    store: StoreHandle,
    span: Span,
}

impl NetworkHost {
    /// Build the swarm, wait until it listens, then hand it to the driver task.
    ///
    /// The host takes over closing `store`.
    pub async fn start(config: HostConfig, store: StoreHandle, span: Span) -> Result<Self, HostError> {
        let net_store = Namespaced::with_prefix(store.clone(), NET_NAMESPACE);
        let keypair = identity::load_or_generate(&net_store)
            .instrument(span.clone())
            .await?;
        let peer_id = keypair.public().to_peer_id();

        let mut swarm = build_swarm(keypair, config.enable_pubsub)?;
        swarm
            .listen_on(config.listen_addr.clone())
            .map_err(|e| HostError::Listen {
                addr: config.listen_addr.clone(),
                reason: e.to_string(),
            })?;
        let first = match tokio::time::timeout(
            LISTEN_TIMEOUT,
            first_listen_addr(&mut swarm, &config.listen_addr),
        )
        .await
        {
            Ok(addr) => addr?,
            Err(_) => return Err(HostError::ListenTimeout(config.listen_addr)),
        };
        span.in_scope(|| tracing::info!(%peer_id, addr = %first, "Network host listening"));

        let mut driver = Driver {
            swarm,
            store: net_store,
            conns: ConnManager::new(config.conn_limits),
            pending_dials: HashMap::new(),
            remote_addrs: HashMap::new(),
            listen_addrs: vec![first],
        };
        span.in_scope(|| driver.bootstrap(&config.bootstrap));

        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = tokio::spawn(driver.run(rx).instrument(span.clone()));

        Ok(Self {
            peer_id,
            commands,
            driver: Mutex::new(Some(handle)),
            store,
            span,
        })
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub async fn listen_addrs(&self) -> Result<Vec<Multiaddr>, HostError> {
        self.request(|reply| Command::ListenAddrs { reply }).await
    }

    /// Dial `addr` and wait until the connection is established.
    pub async fn connect(&self, addr: Multiaddr) -> Result<PeerId, HostError> {
        self.request(|reply| Command::Dial { addr, reply }).await?
    }

    pub async fn peers(&self) -> Result<Vec<PeerInfo>, HostError> {
        self.request(|reply| Command::Peers { reply }).await
    }

    /// Stop the swarm driver, then close the datastore. Idempotent.
    pub async fn close(&self) -> Result<(), HostError> {
        let Some(driver) = self.driver.lock().await.take() else {
            return Ok(());
        };
        // A send error means the driver already exited.
        let _ = self.commands.send(Command::Shutdown).await;
        driver.await?;
        self.store.close().await?;
        self.span.in_scope(|| tracing::info!(peer_id = %self.peer_id, "Network host closed"));
        Ok(())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, HostError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| HostError::Closed)?;
        rx.await.map_err(|_| HostError::Closed)
    }
}

async fn first_listen_addr(swarm: &mut HostSwarm, requested: &Multiaddr) -> Result<Multiaddr, HostError> {
    loop {
        match swarm.select_next_some().await {
            SwarmEvent::NewListenAddr { address, .. } => return Ok(address),
            SwarmEvent::ListenerError { error, .. } => {
                return Err(HostError::Listen {
                    addr: requested.clone(),
                    reason: error.to_string(),
                })
            }
            SwarmEvent::ListenerClosed { reason, .. } => {
                return Err(HostError::Listen {
                    addr: requested.clone(),
                    reason: match reason {
                        Ok(()) => "listener closed".to_string(),
                        Err(e) => e.to_string(),
                    },
                })
            }
            _ => {}
        }
    }
}

struct PendingDial {
    addr: Multiaddr,
    reply: oneshot::Sender<Result<PeerId, HostError>>,
}

struct Driver {
    swarm: HostSwarm,
    store: Namespaced,
    conns: ConnManager<ConnectionId>,
    pending_dials: HashMap<ConnectionId, PendingDial>,
    remote_addrs: HashMap<PeerId, Multiaddr>,
    listen_addrs: Vec<Multiaddr>,
}

impl Driver {
    fn bootstrap(&mut self, peers: &[Multiaddr]) {
        for addr in peers {
            match self.swarm.dial(addr.clone()) {
                Ok(()) => tracing::debug!(%addr, "Dialing bootstrap peer"),
                Err(e) => tracing::warn!(%addr, error = %e, "Bootstrap dial failed"),
            }
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut prune_tick = tokio::time::interval(PRUNE_INTERVAL);
        prune_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.swarm.select_next_some() => self.on_swarm_event(event).await,
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
                _ = prune_tick.tick() => self.prune(),
            }
        }

        for (_, pending) in self.pending_dials.drain() {
            let _ = pending.reply.send(Err(HostError::Closed));
        }
        tracing::debug!("Network host driver stopped");
    }

    async fn on_swarm_event(&mut self, event: SwarmEvent<HostBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                tracing::info!(%address, "Listening");
                if !self.listen_addrs.contains(&address) {
                    self.listen_addrs.push(address);
                }
            }
            SwarmEvent::ExpiredListenAddr { address, .. } => {
                self.listen_addrs.retain(|a| a != &address);
            }
            SwarmEvent::ConnectionEstablished {
                peer_id,
                connection_id,
                endpoint,
                ..
            } => {
                self.conns.opened(connection_id, Instant::now());
                self.remote_addrs
                    .insert(peer_id, endpoint.get_remote_address().clone());
                if let Some(pending) = self.pending_dials.remove(&connection_id) {
                    let _ = pending.reply.send(Ok(peer_id));
                }
                tracing::debug!(%peer_id, total = self.conns.len(), "Connection established");
                self.prune();
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                connection_id,
                num_established,
                ..
            } => {
                self.conns.closed(&connection_id);
                if num_established == 0 {
                    self.remote_addrs.remove(&peer_id);
                }
                tracing::debug!(%peer_id, total = self.conns.len(), "Connection closed");
            }
            SwarmEvent::OutgoingConnectionError {
                connection_id,
                peer_id,
                error,
            } => match self.pending_dials.remove(&connection_id) {
                Some(pending) => {
                    let _ = pending.reply.send(Err(HostError::Dial {
                        addr: pending.addr,
                        reason: error.to_string(),
                    }));
                }
                None => tracing::debug!(?peer_id, error = %error, "Outgoing connection failed"),
            },
            SwarmEvent::Behaviour(HostBehaviourEvent::Identify(identify::Event::Received {
                peer_id,
                info,
                ..
            })) => record_peer(&self.store, peer_id, &info.listen_addrs).await,
            _ => {}
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Dial { addr, reply } => {
                let opts = DialOpts::from(addr.clone());
                let connection_id = opts.connection_id();
                match self.swarm.dial(opts) {
                    Ok(()) => {
                        self.pending_dials
                            .insert(connection_id, PendingDial { addr, reply });
                    }
                    Err(e) => {
                        let _ = reply.send(Err(HostError::Dial {
                            addr,
                            reason: e.to_string(),
                        }));
                    }
                }
            }
            Command::Peers { reply } => {
                let peers = self
                    .swarm
                    .connected_peers()
                    .map(|id| PeerInfo {
                        id: *id,
                        addrs: self.remote_addrs.get(id).cloned().into_iter().collect(),
                    })
                    .collect();
                let _ = reply.send(peers);
            }
            Command::ListenAddrs { reply } => {
                let _ = reply.send(self.listen_addrs.clone());
            }
            Command::Shutdown => {}
        }
    }

    fn prune(&mut self) {
        let victims = self.conns.prune(Instant::now());
        if victims.is_empty() {
            return;
        }
        tracing::debug!(closing = victims.len(), "Pruning connections above high water");
        for connection_id in victims {
            self.swarm.close_connection(connection_id);
        }
    }
}

/// Persist identify-learned addresses under `/peers/<id>`. Failures are logged only.
async fn record_peer(store: &Namespaced, peer_id: PeerId, addrs: &[Multiaddr]) {
    let key = Key::new("/peers").child(peer_id.to_string());
    let addrs: Vec<String> = addrs.iter().map(ToString::to_string).collect();
    let result = match serde_json::to_vec(&addrs) {
        Ok(encoded) => store.put(&key, encoded).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    if let Err(e) = result {
        tracing::warn!(%peer_id, error = %e, "Failed to record peer addresses");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{EmbeddedStore, StoreError, EVENTSTORE_COLLECTION};
    use libp2p::multiaddr::Protocol;
    use std::sync::Arc;

    fn test_config() -> HostConfig {
        HostConfig {
            listen_addr: "/ip4/127.0.0.1/tcp/0".parse().unwrap(),
            conn_limits: ConnLimits {
                low_water: 10,
                high_water: 20,
                grace_period: Duration::from_secs(20),
            },
            enable_pubsub: false,
            bootstrap: Vec::new(),
        }
    }

    fn open_store(dir: &tempfile::TempDir) -> StoreHandle {
        Arc::new(EmbeddedStore::open(dir.path(), EVENTSTORE_COLLECTION).unwrap())
    }

    #[tokio::test]
    async fn hosts_connect_and_list_peers() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let a = NetworkHost::start(test_config(), open_store(&dir_a), Span::none())
            .await
            .unwrap();
        let mut config_b = test_config();
        config_b.enable_pubsub = true;
        let b = NetworkHost::start(config_b, open_store(&dir_b), Span::none())
            .await
            .unwrap();

        let addr = a.listen_addrs().await.unwrap()[0]
            .clone()
            .with(Protocol::P2p(a.peer_id()));
        assert_eq!(b.connect(addr).await.unwrap(), a.peer_id());

        let peers = b.peers().await.unwrap();
        assert!(peers.iter().any(|p| p.id == a.peer_id()));

        b.close().await.unwrap();
        a.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_stops_driver_and_store_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let host = NetworkHost::start(test_config(), store.clone(), Span::none())
            .await
            .unwrap();

        host.close().await.unwrap();
        host.close().await.unwrap();
        assert!(matches!(host.peers().await, Err(HostError::Closed)));
        assert!(matches!(store.get(&Key::new("/x")).await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn identity_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let first = NetworkHost::start(test_config(), open_store(&dir), Span::none())
            .await
            .unwrap();
        let peer_id = first.peer_id();
        first.close().await.unwrap();
        drop(first);

        let second = NetworkHost::start(test_config(), open_store(&dir), Span::none())
            .await
            .unwrap();
        assert_eq!(second.peer_id(), peer_id);
        second.close().await.unwrap();
    }
}
