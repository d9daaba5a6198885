//! Error types for the status watcher

use std::path::PathBuf;

/// Errors that surface to the process boundary
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("State store {path}: {reason}")]
    Store { path: PathBuf, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Probe failed: {0}")]
    Probe(String),
}

impl WatchError {
    pub(crate) fn store(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        WatchError::Store {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for watcher operations
pub type Result<T> = std::result::Result<T, WatchError>;
