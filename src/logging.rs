//! Tracing subscriber setup
//!
//! The TUI owns the terminal, so while browsing events go to a daily log file
//! under the data directory. One-shot commands log to stderr, leaving stdout to
//! the JSON they print.

use directories::ProjectDirs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "dareadmin.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level '{0}'. Valid levels: trace, debug, info, warn, error")]
    InvalidLevel(String),

    #[error("Failed to create log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Where log events are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    /// File target in the platform data directory, else stderr
    pub fn for_tui() -> Self {
        match ProjectDirs::from("", "", "dareadmin") {
            Some(dirs) => LogTarget::File(dirs.data_local_dir().join("logs")),
            None => LogTarget::Stderr,
        }
    }
}

/// Keeps the non-blocking writer flushing until dropped
pub struct LogGuard {
    _guard: Option<WorkerGuard>,
}

pub fn parse_log_level(level: &str) -> Result<Level, LoggingError> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(LoggingError::InvalidLevel(level.to_string())),
    }
}

/// Installs the global subscriber
///
/// `RUST_LOG` directives win over `level`.
pub fn init(level: &str, target: &LogTarget) -> Result<LogGuard, LoggingError> {
    let default_level = parse_log_level(level)?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    match target {
        LogTarget::Stderr => {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_filter(env_filter);
            tracing_subscriber::registry()
                .with(layer)
                .try_init()
                .map_err(|e| LoggingError::Init(e.to_string()))?;
            Ok(LogGuard { _guard: None })
        }
        LogTarget::File(dir) => {
            ensure_dir(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(env_filter);
            tracing_subscriber::registry()
                .with(layer)
                .try_init()
                .map_err(|e| LoggingError::Init(e.to_string()))?;
            Ok(LogGuard {
                _guard: Some(guard),
            })
        }
    }
}

fn ensure_dir(dir: &Path) -> Result<(), LoggingError> {
    std::fs::create_dir_all(dir).map_err(|source| LoggingError::LogDir {
        path: dir.to_path_buf(),
        source,
    })
}
