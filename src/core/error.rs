//! Defines the custom error type for the `core` module.

use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for the `core` module.
///
/// Covers the file-system side of the application: scanning source folders,
/// building ignore patterns and transferring files to their destination.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Represents an I/O error, typically from file system operations.
    #[error("I/O error for path {1}: {0}")]
    Io(#[source] std::io::Error, PathBuf),

    /// Represents an error that occurred when a Tokio task was joined.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Invalid glob pattern: {0}")]
    GlobPattern(#[from] globset::Error),

    /// Represents a path that was expected to be a directory but was not.
    #[error("Path is not a valid directory: {0}")]
    NotADirectory(PathBuf),

    /// The scanned folders hold more files than the configured maximum.
    #[error("More than {limit} files found")]
    LimitExceeded { limit: usize },

    /// Apply never overwrites.
    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),
}

impl CoreError {
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io(source, path.into())
    }
}
