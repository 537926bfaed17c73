//! Configuration loading from the command line and environment.

use std::ffi::OsString;

use clap::Parser;

use crate::config::schema::DaemonConfig;
use crate::config::validation::{validate_config, ConfigError, ResolvedConfig};

/// Load and validate configuration from the process arguments.
///
/// `--help` and `--version` surface as [`ConfigError::Parse`]; callers
/// should let clap print them via [`clap::Error::exit`].
pub fn load_config() -> Result<ResolvedConfig, ConfigError> {
    load_config_from(std::env::args_os())
}

/// Load and validate configuration from an explicit argument list.
pub fn load_config_from<I, T>(args: I) -> Result<ResolvedConfig, ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let raw = DaemonConfig::try_parse_from(args)?;
    validate_config(&raw)
}
