use hb_types::ContentHash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote error: code={code}, message={message}")]
    Remote { code: u32, message: String },

    #[error("not a fast-forward update for source {source_id}: destination commit {dest_commit} is not in the source history")]
    NotFastForward {
        source_id: String,
        dest_commit: ContentHash,
    },

    #[error("commit not found: {0}")]
    CommitNotFound(ContentHash),

    #[error("unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("pipeline task failed: {0}")]
    Task(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] hb_protocol::ProtocolError),

    #[error("ledger error: {0}")]
    Ledger(#[from] hb_ledger::LedgerError),

    #[error("merge error: {0}")]
    Merge(#[from] hb_merge::MergeError),

    #[error("store error: {0}")]
    Store(#[from] hb_store::StoreError),

    #[error("index error: {0}")]
    Index(#[from] hb_index::IndexError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
