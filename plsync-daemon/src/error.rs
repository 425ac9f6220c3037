use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the scheduler runtime and the HTTP puller.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] plsync_core::ConfigError),

    #[error("sync error: {0}")]
    Sync(#[from] plsync_sync::SyncError),

    #[error("invalid site URL '{0}': expected scheme://host[?query]")]
    InvalidSiteUrl(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
