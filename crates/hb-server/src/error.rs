use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("protocol error: {0}")]
    Protocol(#[from] hb_protocol::ProtocolError),

    #[error("sync error: {0}")]
    Sync(#[from] hb_sync::SyncError),

    #[error("ledger error: {0}")]
    Ledger(#[from] hb_ledger::LedgerError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;
