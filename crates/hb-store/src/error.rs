use hb_types::ContentHash;

/// Errors from object repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ContentHash),

    /// The object data is malformed or cannot be decoded.
    #[error("corrupt object {hash}: {reason}")]
    CorruptObject { hash: ContentHash, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A bulk stream ran out before a descriptor's byte budget was consumed.
    #[error("bulk stream truncated at {hash}: expected {expected} bytes, got {actual}")]
    TruncatedStream {
        hash: ContentHash,
        expected: u64,
        actual: u64,
    },

    /// An internal lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hb_crypto::CanonicalError> for StoreError {
    fn from(e: hb_crypto::CanonicalError) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
