//! Error types for the index crate.

/// Errors that can occur while hashing or browsing a working tree.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The path cannot be used (relative where absolute is required, not UTF-8).
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The consumer stopped the walk.
    #[error("browse cancelled")]
    Cancelled,

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("cache lock poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for IndexError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<hb_crypto::CanonicalError> for IndexError {
    fn from(e: hb_crypto::CanonicalError) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
