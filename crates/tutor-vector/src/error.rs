//! Error types for tutor-vector.

use thiserror::Error;

/// Result type for tutor-vector operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tutor-vector operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A collection with this name is already persisted or attached.
    #[error("Collection '{0}' already exists")]
    CollectionExists(String),

    /// No collection with this name exists in memory or on disk.
    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    /// The collection exists on disk but cannot be read back.
    #[error("Collection '{name}' is corrupted: {reason}")]
    Corrupted {
        /// Collection name.
        name: String,
        /// What failed while reading it.
        reason: String,
    },

    /// Dimension mismatch between vector and collection.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions.
        expected: usize,
        /// Actual dimensions provided.
        actual: usize,
    },

    /// Invalid vector (e.g., empty, contains NaN).
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// Invalid caller-supplied argument (k = 0, bad collection name, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// `search` was called on a handle that was never built or loaded.
    #[error("Vector index is not initialized; build or load a collection first")]
    Uninitialized,

    /// Index error during HNSW operations.
    #[error("Index error: {0}")]
    Index(String),

    /// Persistence error (serialization, rename, ...).
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn corrupted(name: &str, reason: impl Into<String>) -> Self {
        Error::Corrupted {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
