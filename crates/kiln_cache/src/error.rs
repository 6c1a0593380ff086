//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur while detecting changes, pruning, or persisting
/// manifests.
///
/// These are never swallowed: a file that cannot be hashed or an artifact that
/// cannot be deleted aborts the run rather than producing a wrong change set.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading, writing, or deleting a file.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A directory tree could not be walked.
    #[error("failed to walk {path}: {source}")]
    Walk {
        /// The root of the walk.
        path: PathBuf,
        /// The underlying traversal error.
        source: walkdir::Error,
    },

    /// The manifest file exists but is not a valid path → fingerprint object.
    #[error("failed to parse manifest {path}: {reason}")]
    ManifestParse {
        /// The manifest file.
        path: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// A manifest could not be serialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| CacheError::Io { path, source }
    }
}
