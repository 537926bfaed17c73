//! Address parsing helpers: multiaddrs for the p2p and rpc listeners,
//! `host:port` for the gateway.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use libp2p::multiaddr::{self, Protocol};
use libp2p::Multiaddr;
use thiserror::Error;

/// Error converting a multiaddr into a TCP socket address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddrError {
    #[error("address has no ip4 or ip6 component")]
    MissingIp,
    #[error("address has no tcp component")]
    MissingTcp,
    #[error("missing port in address")]
    MissingPort,
    #[error("invalid port {0:?}")]
    InvalidPort(String),
    #[error("ipv6 hosts must be bracketed")]
    UnbracketedIpv6,
}

/// A `host:port` pair whose host may be a name, resolved at bind time.
///
/// An empty host (`:8000`) listens on every IPv4 interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

impl HostPort {
    /// Resolve to the first address the host name maps to.
    pub async fn resolve(&self) -> std::io::Result<SocketAddr> {
        let host = if self.host.is_empty() { "0.0.0.0" } else { self.host.as_str() };
        tokio::net::lookup_host((host, self.port))
            .await?
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "host resolved to no addresses"))
    }
}

impl FromStr for HostPort {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s.rsplit_once(':').ok_or(AddrError::MissingPort)?;
        let host = match host.strip_prefix('[') {
            Some(inner) => inner.strip_suffix(']').ok_or(AddrError::UnbracketedIpv6)?,
            None if host.contains(':') => return Err(AddrError::UnbracketedIpv6),
            None => host,
        };
        let port = port.parse().map_err(|_| AddrError::InvalidPort(port.to_string()))?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Parse a multiaddr string.
pub fn parse_multiaddr(value: &str) -> Result<Multiaddr, multiaddr::Error> {
    value.parse()
}

/// Resolve `/ip4/<ip>/tcp/<port>` (or the ip6 form) to a socket address.
pub fn tcp_socket_addr(addr: &Multiaddr) -> Result<SocketAddr, AddrError> {
    let mut ip: Option<IpAddr> = None;
    let mut port: Option<u16> = None;

    for protocol in addr.iter() {
        match protocol {
            Protocol::Ip4(v4) if ip.is_none() => ip = Some(IpAddr::V4(v4)),
            Protocol::Ip6(v6) if ip.is_none() => ip = Some(IpAddr::V6(v6)),
            Protocol::Tcp(p) if port.is_none() => port = Some(p),
            _ => {}
        }
    }

    let ip = ip.ok_or(AddrError::MissingIp)?;
    let port = port.ok_or(AddrError::MissingTcp)?;
    Ok(SocketAddr::new(ip, port))
}
