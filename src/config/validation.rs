//! Configuration validation.
//!
//! # Responsibilities
//! - Parse every address-typed option (multiaddr or `host:port`)
//! - Enforce paired options (`mongoUri` requires `mongoDatabase`)
//! - Validate value ranges (watermarks, keep-alive interval)
//! - Expand environment references in filesystem paths
//! - Select the storage backend variant
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: DaemonConfig → Result<ResolvedConfig, ConfigError>
//! - Runs before any component is constructed

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use libp2p::Multiaddr;
use thiserror::Error;
use url::Url;

use crate::config::expand::expand_env;
use crate::config::schema::DaemonConfig;
use crate::net::addr::{parse_multiaddr, tcp_socket_addr, HostPort};

/// Smallest keep-alive interval the bridge accepts.
pub const MIN_KEEP_ALIVE: Duration = Duration::from_secs(1);

/// A single semantic problem with the supplied options.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{option}: invalid address {value:?}: {reason}")]
    InvalidAddress {
        option: &'static str,
        value: String,
        reason: String,
    },

    #[error("{option}: invalid url: {reason}")]
    InvalidUrl { option: &'static str, reason: String },

    #[error("mongoDatabase is required with mongoUri")]
    MissingDatabase,

    #[error("connLowWater ({low}) must not exceed connHighWater ({high})")]
    Watermarks { low: usize, high: usize },

    #[error("connHighWater must be greater than zero")]
    ZeroHighWater,

    #[error("keepAliveInterval must be >= 1s, got {0:?}")]
    KeepAliveTooShort(Duration),
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Parse(#[from] clap::Error),

    #[error("{}", ValidationList(.0))]
    Validation(Vec<ValidationError>),
}

struct ValidationList<'a>(&'a [ValidationError]);

impl fmt::Display for ValidationList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: ")?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// Persistent store selected for this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Embedded key-value store rooted at an expanded path.
    Embedded { path: PathBuf },
    /// External document store.
    External { uri: String, database: String },
}

impl StorageBackend {
    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            StorageBackend::Embedded { .. } => "embedded",
            StorageBackend::External { .. } => "external",
        }
    }
}

/// Connection manager watermarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnLimits {
    pub low_water: usize,
    pub high_water: usize,
    pub grace_period: Duration,
}

/// Validated, immutable daemon configuration.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub host_addr: Multiaddr,
    pub api_addr: SocketAddr,
    pub api_proxy_addr: SocketAddr,
    pub gateway_addr: HostPort,
    pub gateway_url: Url,
    pub gateway_subdomains: bool,
    pub conn_limits: ConnLimits,
    pub keep_alive_interval: Duration,
    pub enable_net_pubsub: bool,
    pub storage: StorageBackend,
    pub debug: bool,
    pub log_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Log every resolved value at debug level, redacting credentials.
    pub fn log_resolved(&self) {
        tracing::debug!(host_addr = %self.host_addr, "hostAddr");
        tracing::debug!(api_addr = %self.api_addr, "apiAddr");
        tracing::debug!(api_proxy_addr = %self.api_proxy_addr, "apiProxyAddr");
        tracing::debug!(gateway_addr = %self.gateway_addr, "gatewayAddr");
        tracing::debug!(gateway_url = %self.gateway_url, "gatewayUrl");
        tracing::debug!(gateway_subdomains = self.gateway_subdomains, "gatewaySubdomains");
        tracing::debug!(conn_low_water = self.conn_limits.low_water, "connLowWater");
        tracing::debug!(conn_high_water = self.conn_limits.high_water, "connHighWater");
        tracing::debug!(conn_grace_period = ?self.conn_limits.grace_period, "connGracePeriod");
        tracing::debug!(keep_alive_interval = ?self.keep_alive_interval, "keepAliveInterval");
        tracing::debug!(enable_net_pubsub = self.enable_net_pubsub, "enableNetPubsub");
        match &self.storage {
            StorageBackend::Embedded { path } => {
                tracing::debug!(badger_repo = %path.display(), "badgerRepo");
            }
            StorageBackend::External { uri, database } => {
                tracing::debug!(mongo_uri = %redact_uri(uri), "mongoUri");
                tracing::debug!(mongo_database = %database, "mongoDatabase");
            }
        }
        tracing::debug!(debug = self.debug, "debug");
        if let Some(path) = &self.log_file {
            tracing::debug!(log = %path.display(), "log");
        }
    }
}

/// Replace the password component of a connection URI.
pub fn redact_uri(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(mut url) => {
            if url.password().is_some() && url.set_password(Some("xxxxx")).is_err() {
                return "<redacted>".to_string();
            }
            url.to_string()
        }
        Err(_) => "<redacted>".to_string(),
    }
}

/// Validate raw options and produce the resolved configuration.
pub fn validate_config(config: &DaemonConfig) -> Result<ResolvedConfig, ConfigError> {
    let mut errors = Vec::new();

    let host_addr = multiaddr_option("hostAddr", &config.host_addr, &mut errors);
    let api_addr = api_option("apiAddr", &config.api_addr, &mut errors);
    let api_proxy_addr = api_option("apiProxyAddr", &config.api_proxy_addr, &mut errors);

    let gateway_addr = match config.gateway_addr.parse::<HostPort>() {
        Ok(addr) => Some(addr),
        Err(e) => {
            errors.push(ValidationError::InvalidAddress {
                option: "gatewayAddr",
                value: config.gateway_addr.clone(),
                reason: e.to_string(),
            });
            None
        }
    };

    let gateway_url = match Url::parse(&config.gateway_url) {
        Ok(url) => Some(url),
        Err(e) => {
            errors.push(ValidationError::InvalidUrl {
                option: "gatewayUrl",
                reason: e.to_string(),
            });
            None
        }
    };

    if config.conn_high_water == 0 {
        errors.push(ValidationError::ZeroHighWater);
    }
    if config.conn_low_water > config.conn_high_water {
        errors.push(ValidationError::Watermarks {
            low: config.conn_low_water,
            high: config.conn_high_water,
        });
    }
    if config.keep_alive_interval < MIN_KEEP_ALIVE {
        errors.push(ValidationError::KeepAliveTooShort(config.keep_alive_interval));
    }

    let storage = if config.mongo_uri.is_empty() {
        Some(StorageBackend::Embedded {
            path: PathBuf::from(expand_env(&config.badger_repo)),
        })
    } else {
        let mut valid = true;
        if let Err(e) = Url::parse(&config.mongo_uri) {
            // The parse error never echoes the URI, so credentials stay out of logs.
            errors.push(ValidationError::InvalidUrl {
                option: "mongoUri",
                reason: e.to_string(),
            });
            valid = false;
        }
        if config.mongo_database.is_empty() {
            errors.push(ValidationError::MissingDatabase);
            valid = false;
        }
        valid.then(|| StorageBackend::External {
            uri: config.mongo_uri.clone(),
            database: config.mongo_database.clone(),
        })
    };

    let log_file = Some(expand_env(&config.log))
        .filter(|path| !path.is_empty())
        .map(PathBuf::from);

    match (host_addr, api_addr, api_proxy_addr, gateway_addr, gateway_url, storage) {
        (Some(host_addr), Some(api_addr), Some(api_proxy_addr), Some(gateway_addr), Some(gateway_url), Some(storage))
            if errors.is_empty() =>
        {
            Ok(ResolvedConfig {
                host_addr,
                api_addr,
                api_proxy_addr,
                gateway_addr,
                gateway_url,
                gateway_subdomains: config.gateway_subdomains,
                conn_limits: ConnLimits {
                    low_water: config.conn_low_water,
                    high_water: config.conn_high_water,
                    grace_period: config.conn_grace_period,
                },
                keep_alive_interval: config.keep_alive_interval,
                enable_net_pubsub: config.enable_net_pubsub,
                storage,
                debug: config.debug,
                log_file,
            })
        }
        _ => Err(ConfigError::Validation(errors)),
    }
}

fn multiaddr_option(
    option: &'static str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<Multiaddr> {
    match parse_multiaddr(value) {
        Ok(addr) => Some(addr),
        Err(e) => {
            errors.push(ValidationError::InvalidAddress {
                option,
                value: value.to_string(),
                reason: e.to_string(),
            });
            None
        }
    }
}

fn api_option(
    option: &'static str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<SocketAddr> {
    let addr = multiaddr_option(option, value, errors)?;
    match tcp_socket_addr(&addr) {
        Ok(socket) => Some(socket),
        Err(e) => {
            errors.push(ValidationError::InvalidAddress {
                option,
                value: value.to_string(),
                reason: e.to_string(),
            });
            None
        }
    }
}
