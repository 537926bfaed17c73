//! Default bootstrap peers.

use libp2p::Multiaddr;

const DEFAULT_BOOTSTRAP_PEERS: &[&str] = &[
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmNnooDu7bfjPFoTZYxMNLWUQJyrVwtbZg5gBMjTezGAJN",
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmQCU2EcMqAqQPR2i9bChDtGNJchTbq5TbXJJ16u19uLTa",
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmbLHAnMoJPWSCR5Zhtx6BHJX9KiKNN6tpvbUcqanj75Nb",
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmcZf59bWwK5XFi76CZX8cbJ4BhTzzA3gU1ZjYZcYW3dwt",
    "/ip4/104.131.131.82/tcp/4001/p2p/QmaCpDMGvV2BGHeYERUEnRQAwe3N8SzbUtfsmvsqQLuvuJ",
];

/// The hardcoded peers dialled after the host starts.
pub fn default_peers() -> Vec<Multiaddr> {
    DEFAULT_BOOTSTRAP_PEERS
        .iter()
        .filter_map(|raw| match raw.parse() {
            Ok(addr) => Some(addr),
            Err(e) => {
                tracing::warn!(addr = raw, error = %e, "Skipping malformed bootstrap address");
                None
            }
        })
        .collect()
}
