//! Network plumbing shared by every listener.
//!
//! # Data Flow
//! ```text
//! configured multiaddr
//!     → addr.rs (multiaddr → socket address)
//!     → listener.rs (bind, report bound address)
//!     → handed to the rpc, bridge and gateway servers
//! ```
//!
//! # Design Decisions
//! - Only TCP over IPv4/IPv6 is served; other transports are rejected at
//!   validation time
//! - Bind failures are fatal startup errors

pub mod addr;
pub mod listener;
