use thiserror::Error;

/// Failures parsing the textual form of a [`ContentHash`](crate::ContentHash).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("content hash is not hex: {0}")]
    InvalidHex(String),

    #[error("content hash must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
