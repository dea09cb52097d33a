use hb_types::ContentHash;

/// Errors from diff computation.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("directory descriptor not found: {0}")]
    DescriptorNotFound(ContentHash),

    #[error("commit not found: {0}")]
    CommitNotFound(ContentHash),

    #[error("store error: {0}")]
    Store(#[from] hb_store::StoreError),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
