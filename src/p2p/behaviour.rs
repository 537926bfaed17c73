//! Swarm behaviour and construction.

use std::time::Duration;

use libp2p::identity::Keypair;
use libp2p::swarm::behaviour::toggle::Toggle;
use libp2p::swarm::NetworkBehaviour;
use libp2p::{gossipsub, identify, noise, ping, tcp, yamux, Swarm, SwarmBuilder};

use super::HostError;

pub const PROTOCOL_VERSION: &str = "/threads/0.1.0";

const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

pub type HostSwarm = Swarm<HostBehaviour>;

#[derive(NetworkBehaviour)]
pub struct HostBehaviour {
    pub identify: identify::Behaviour,
    pub ping: ping::Behaviour,
    /// Enabled with `--enableNetPubsub`.
    pub pubsub: Toggle<gossipsub::Behaviour>,
}

fn build_error(e: impl std::fmt::Display) -> HostError {
    HostError::Build(e.to_string())
}

/// Build a TCP + Noise + Yamux swarm with DNS resolution.
pub fn build_swarm(keypair: Keypair, enable_pubsub: bool) -> Result<HostSwarm, HostError> {
    let swarm = SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(
            tcp::Config::default().nodelay(true),
            noise::Config::new,
            yamux::Config::default,
        )
        .map_err(build_error)?
        .with_dns()
        .map_err(build_error)?
        .with_behaviour(|key| {
            let identify = identify::Behaviour::new(
                identify::Config::new(PROTOCOL_VERSION.to_string(), key.public())
                    .with_agent_version(format!("threadsd/{}", env!("CARGO_PKG_VERSION"))),
            );
            let pubsub = if enable_pubsub {
                Some(gossipsub::Behaviour::new(
                    gossipsub::MessageAuthenticity::Signed(key.clone()),
                    gossipsub::Config::default(),
                )?)
            } else {
                None
            };
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(HostBehaviour {
                identify,
                ping: ping::Behaviour::new(ping::Config::new()),
                pubsub: Toggle::from(pubsub),
            })
        })
        .map_err(build_error)?
        .with_swarm_config(|c| c.with_idle_connection_timeout(IDLE_CONNECTION_TIMEOUT))
        .build();
    Ok(swarm)
}
