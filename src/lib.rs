//! threadsd: daemon lifecycle for a threads peer.
//!
//! # Architecture Overview
//!
//! ```text
//!   config ──→ storage ──→ p2p host ──→ rpc ──┬──→ bridge  (gRPC-web, websockets)
//!                 │                           │
//!                 └──────→ db manager ────────┴──→ gateway (HTTP, JSON)
//!
//!   lifecycle: ordered startup, serve supervision, interrupt-driven shutdown
//!   observability: logging setup and per-component spans
//! ```

// Core subsystems
pub mod config;
pub mod net;
pub mod storage;

// Services
pub mod bridge;
pub mod db;
pub mod gateway;
pub mod p2p;
pub mod rpc;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::{load_config, ResolvedConfig};
pub use lifecycle::{run_until_interrupt, Daemon, Outcome};
