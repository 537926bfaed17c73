//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     ResolvedConfig → datastore → network host → rpc → bridge + gateway
//!
//! Supervision (supervisor.rs):
//!     serve task exits before its stop request → ServeError → coordinator
//!
//! Shutdown (coordinator.rs, shutdown.rs):
//!     interrupt → Stopping → gateway → bridge (1s) → rpc → host
//!     second interrupt → forced exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup, and reverse-order rollback when a step fails
//! - Shutdown steps never overlap
//! - Only the bridge has a shutdown deadline; the rest wait for in-flight work

pub mod coordinator;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use coordinator::{run_until_interrupt, FatalError, Outcome};
pub use shutdown::{LifecycleState, ShutdownError};
pub use signals::{CtrlC, InterruptSource};
pub use startup::{BoundAddrs, Daemon, StartupError};
pub use supervisor::ServeError;
