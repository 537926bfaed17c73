//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! command line + THREADS_* environment
//!     → schema.rs (clap parse, defaults, typed values)
//!     → validation.rs (semantic checks, env expansion, backend selection)
//!     → ResolvedConfig (validated, immutable)
//!     → handed by value to lifecycle::startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once resolved; there is no reload path
//! - Every option has a default so an empty command line is valid
//! - Validation separates syntactic (clap) from semantic checks
//! - The storage backend is a closed variant decided here, never later

pub mod expand;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_from};
pub use schema::DaemonConfig;
pub use validation::{ConfigError, ConnLimits, ResolvedConfig, StorageBackend};
