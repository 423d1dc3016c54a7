//! Error types for the watch and rebuild pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the watch pipeline. Everything here is fatal: individual-file
/// conditions (unreadable, vanished, ignored) are skipped inside the loop
/// and never become a `WatchError`.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("cannot scan root {path}: {reason}")]
    ScanFailed { path: PathBuf, reason: String },

    #[error("cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("file system event error: {details}")]
    EventError { details: String },

    #[error("event channel closed unexpectedly")]
    ChannelClosed,

    #[error(transparent)]
    Build(#[from] crate::builder::BuildError),

    #[error(transparent)]
    Publish(#[from] crate::publish::PublishError),
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}
