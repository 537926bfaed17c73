//! Structured logging.
//!
//! # Responsibilities
//! - Install the process-wide subscriber exactly once
//! - Route output to stderr or to the `--log` file
//! - Hand each component its own span
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the built-in default filter
//! - `--debug` always raises the daemon's own targets to debug
//! - File output is non-blocking; the returned guard flushes on drop

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::Span;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "threadsd=info";
const DEBUG_DIRECTIVE: &str = "threadsd=debug";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("log path {0} has no file name")]
    InvalidPath(PathBuf),

    #[error("failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("logging already initialised: {0}")]
    Init(#[from] TryInitError),
}

/// Keeps the file writer alive; drop it last.
#[must_use]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Filter from `RUST_LOG`, falling back to `threadsd=info`.
pub fn filter(debug: bool) -> Result<EnvFilter, LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if debug {
        return Ok(filter.add_directive(DEBUG_DIRECTIVE.parse()?));
    }
    Ok(filter)
}

pub fn init(debug: bool, log_file: Option<&Path>) -> Result<LogGuard, LoggingError> {
    let filter = filter(debug)?;

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()?;
        return Ok(LogGuard { _file: None });
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidPath(path.to_path_buf()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()?;
    Ok(LogGuard { _file: Some(guard) })
}

/// The span injected into a component and its background tasks.
pub fn component_span(component: &'static str) -> Span {
    tracing::info_span!("component", component)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_adds_daemon_directive() {
        let rendered = filter(true).unwrap().to_string();
        assert!(rendered.contains(DEBUG_DIRECTIVE), "{rendered}");
    }

    #[test]
    fn log_path_must_name_a_file() {
        assert!(matches!(init(false, Some(Path::new("/"))), Err(LoggingError::InvalidPath(_))));
    }
}
