//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! main
//!     → logging::init (EnvFilter + fmt layer, optional file writer)
//!     → logging::component_span for each component
//!         → startup, host driver, rpc / bridge / gateway serve tasks
//! ```
//!
//! # Design Decisions
//! - The subscriber is installed once by the binary, never by library code
//! - Components receive their span at construction instead of reaching
//!   for global state

pub mod logging;

pub use logging::{component_span, LogGuard, LoggingError};
