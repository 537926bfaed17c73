//! Configuration schema definitions.
//!
//! Every option is a long flag named exactly like the daemon's historical
//! option (`--hostAddr`) with a `THREADS_`-prefixed environment fallback.

use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

/// Raw daemon options as read from the command line and environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "threadsd", version, about = "Threads network daemon")]
pub struct DaemonConfig {
    /// Libp2p host bind address.
    #[arg(long = "hostAddr", env = "THREADS_HOSTADDR", default_value = "/ip4/0.0.0.0/tcp/4006")]
    pub host_addr: String,

    /// gRPC API bind address.
    #[arg(long = "apiAddr", env = "THREADS_APIADDR", default_value = "/ip4/127.0.0.1/tcp/5000")]
    pub api_addr: String,

    /// gRPC API web proxy bind address.
    #[arg(long = "apiProxyAddr", env = "THREADS_APIPROXYADDR", default_value = "/ip4/127.0.0.1/tcp/5050")]
    pub api_proxy_addr: String,

    /// Gateway bind address (`host:port`; the host may be a name).
    #[arg(long = "gatewayAddr", env = "THREADS_GATEWAYADDR", default_value = "127.0.0.1:8000")]
    pub gateway_addr: String,

    /// Gateway public URL.
    #[arg(long = "gatewayUrl", env = "THREADS_GATEWAYURL", default_value = "http://127.0.0.1:8000")]
    pub gateway_url: String,

    /// Enable gateway namespace subdomain redirection.
    #[arg(
        long = "gatewaySubdomains",
        env = "THREADS_GATEWAYSUBDOMAINS",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub gateway_subdomains: bool,

    /// Low watermark of libp2p connections that'll be maintained.
    #[arg(long = "connLowWater", env = "THREADS_CONNLOWWATER", default_value_t = 100)]
    pub conn_low_water: usize,

    /// High watermark of libp2p connections that'll be maintained.
    #[arg(long = "connHighWater", env = "THREADS_CONNHIGHWATER", default_value_t = 400)]
    pub conn_high_water: usize,

    /// Duration a new opened connection is not subject to pruning.
    #[arg(
        long = "connGracePeriod",
        env = "THREADS_CONNGRACEPERIOD",
        default_value = "20s",
        value_parser = parse_duration
    )]
    pub conn_grace_period: Duration,

    /// Websocket keepalive interval (must be >= 1s).
    #[arg(
        long = "keepAliveInterval",
        env = "THREADS_KEEPALIVEINTERVAL",
        default_value = "5s",
        value_parser = parse_duration
    )]
    pub keep_alive_interval: Duration,

    /// Enables thread networking over libp2p pubsub.
    #[arg(
        long = "enableNetPubsub",
        env = "THREADS_ENABLENETPUBSUB",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub enable_net_pubsub: bool,

    /// Embedded datastore location.
    #[arg(long = "badgerRepo", env = "THREADS_BADGERREPO", default_value = "${HOME}/.threads")]
    pub badger_repo: String,

    /// MongoDB URI (if not provided, an embedded datastore will be used).
    #[arg(long = "mongoUri", env = "THREADS_MONGOURI", default_value = "")]
    pub mongo_uri: String,

    /// MongoDB database name (required with mongoUri).
    #[arg(long = "mongoDatabase", env = "THREADS_MONGODATABASE", default_value = "")]
    pub mongo_database: String,

    /// Enables debug logging.
    #[arg(
        long = "debug",
        env = "THREADS_DEBUG",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub debug: bool,

    /// Write logs to file.
    #[arg(long = "log", env = "THREADS_LOG", default_value = "")]
    pub log: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self::parse_from(["threadsd"])
    }
}

/// Parse a Go-style duration string such as `300ms`, `5s`, `1m30s` or `2h`.
///
/// A bare `0` is accepted; any other value needs a unit on every component.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {input:?}"))?;
        if digits == 0 {
            return Err(format!("invalid duration {input:?}"));
        }
        let (number, tail) = rest.split_at(digits);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);

        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid number {number:?} in duration {input:?}"))?;
        let nanos_per_unit: f64 = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            other => return Err(format!("unknown unit {other:?} in duration {input:?}")),
        };
        total += Duration::from_nanos((value * nanos_per_unit).round() as u64);
        rest = next;
    }
    Ok(total)
}
