//! Error types for the watch registry and event router.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher operations.
#[derive(Error, Debug, Clone)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Subscriber does not implement any of created, changed, removed or renamed")]
    NoCapability,

    #[error("Cannot watch path {path}: {reason}")]
    AddWatch { path: PathBuf, reason: String },

    #[error("Cannot unwatch path {path}: {reason}")]
    RemoveWatch { path: PathBuf, reason: String },

    #[error("File system event error: {details}")]
    Backend { details: String },

    #[error("Failed to load config: {reason}")]
    Config { reason: String },
}

/// Result alias for watcher operations.
pub type WatchResult<T> = Result<T, WatchError>;

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}
