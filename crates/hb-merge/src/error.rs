use hb_types::ContentHash;

/// Errors that abort a merge. Nothing is committed when one is returned.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// A file stands where the merge target path needs a directory.
    #[error("type conflict at {path}: file and directory share a name")]
    TypeConflict { path: String },

    #[error("directory descriptor not found: {0}")]
    DescriptorNotFound(ContentHash),

    #[error("store error: {0}")]
    Store(#[from] hb_store::StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] hb_ledger::LedgerError),
}

pub type MergeResult<T> = Result<T, MergeError>;
