use thiserror::Error;

/// Failures while framing, encoding or negotiating on a connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame tag {0} does not match its payload")]
    TagMismatch(u8),

    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: usize, max: usize },

    #[error("malformed frame: {0}")]
    Framing(String),

    #[error("peer speaks protocol {remote}, we speak {local}")]
    VersionMismatch { local: u32, remote: u32 },

    #[error("bincode: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("unexpected message: {0}")]
    Unexpected(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
