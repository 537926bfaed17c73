//! Peer-to-peer network host.
//!
//! # Data Flow
//! ```text
//! NetworkHost::start
//!     → identity::load_or_generate (/net/host/key)
//!     → behaviour::build_swarm (tcp + noise + yamux, identify, ping, optional gossipsub)
//!     → listen_on(hostAddr), wait for the first listen address
//!     → spawn driver task
//!         ├─ swarm events  → ConnManager bookkeeping, identify peer records
//!         ├─ commands      → dial / peers / listen addrs / shutdown
//!         └─ prune tick    → close connections above high water
//!     → dial bootstrap peers (failures ignored)
//! ```
//!
//! # Responsibilities
//! - Own the peer identity for the process lifetime
//! - Enforce the low/high watermark connection policy
//! - Persist host state in the `/net` namespace of the shared datastore
//! - Close the shared datastore exactly once when the host closes
//!
//! # Design Decisions
//! - The swarm lives entirely inside the driver task; callers talk to it
//!   over an mpsc command channel with oneshot replies
//! - Pub/sub is a toggled behaviour so the swarm type does not change

pub mod behaviour;
pub mod bootstrap;
pub mod connmgr;
pub mod host;
pub mod identity;

use libp2p::Multiaddr;
use thiserror::Error;

use crate::storage::StoreError;

pub use connmgr::ConnManager;
pub use host::{HostConfig, NetworkHost, PeerInfo};

/// Datastore namespace holding all host state.
pub const NET_NAMESPACE: &str = "/net";

#[derive(Debug, Error)]
pub enum HostError {
    #[error("invalid host identity: {0}")]
    Identity(#[from] libp2p::identity::DecodingError),

    #[error("failed to build swarm: {0}")]
    Build(String),

    #[error("failed to listen on {addr}: {reason}")]
    Listen { addr: Multiaddr, reason: String },

    #[error("no listen address reported for {0}")]
    ListenTimeout(Multiaddr),

    #[error("dial {addr} failed: {reason}")]
    Dial { addr: Multiaddr, reason: String },

    #[error("network host is closed")]
    Closed,

    #[error("driver task failed: {0}")]
    Driver(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
