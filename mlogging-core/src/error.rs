use std::{io, path::PathBuf};

use colored::Colorize;
use thiserror::Error;

/// Errors raised while configuring loggers.
///
/// None of these ever reach the code that emits records: construction
/// failures of a single destination are turned into [`diagnostic`] output
/// and the remaining destinations are still configured.
#[derive(Debug, Error)]
pub enum MloggingError {
    #[error("unsupported destination `{0}`")]
    UnsupportedDestination(String),
    #[error("remote collector unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid level name `{0}`")]
    InvalidLevelName(String),
    #[error("logger name must not be empty")]
    EmptyName,
    #[error("logger `{0}` is not configured")]
    NotConfigured(String),
    #[error("a global logger is already installed")]
    AlreadyInitialized,
}

impl MloggingError {
    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

/// Writes a diagnostic line to stderr.
///
/// Diagnostics never go through the registry's own loggers, so a broken
/// destination cannot recurse into itself.
pub fn diagnostic(message: impl std::fmt::Display) {
    eprintln!("{} {message}", "mlogging:".yellow());
}
