use hb_types::ContentHash;

/// Errors produced by source store operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("transaction {actual} is not the open transaction of source {source_id} ({expected:?})")]
    TransactionMismatch {
        source_id: String,
        expected: Option<String>,
        actual: String,
    },

    #[error("commit not found: {0}")]
    CommitNotFound(ContentHash),

    #[error("directory descriptor not found: {0}")]
    DescriptorNotFound(ContentHash),

    #[error("source state lock poisoned")]
    LockPoisoned,

    #[error("store error: {0}")]
    Store(#[from] hb_store::StoreError),

    #[error("ref error: {0}")]
    Refs(#[from] hb_refs::RefError),

    #[error("index error: {0}")]
    Index(#[from] hb_index::IndexError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
