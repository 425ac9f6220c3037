//! Error types for plsync-sync.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from a reconciliation cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The content archive is truncated, not gzip, or has a bad tar header.
    #[error("malformed content archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An archive entry whose name or body is not valid UTF-8.
    #[error("archive entry '{name}' is not valid UTF-8")]
    NonUtf8Entry { name: String },

    /// JSON serialization/deserialization error (record, relation dump, defaults).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The control point could not be reached or answered with garbage.
    #[error("pull failed: {0}")]
    Pull(String),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::Archive`].
pub(crate) fn archive_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Archive {
        path: path.into(),
        source,
    }
}
