use hb_types::ContentHash;
use tracing::{debug, warn};

use crate::error::SyncResult;
use crate::remote::RemoteStore;

/// What happened to one hash during a transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The destination already held at least as many bytes as the source.
    AlreadyPresent,
    /// The missing suffix was sent and validated.
    Transferred { bytes: u64 },
    /// Bytes were sent but the destination rejected them on validation.
    ValidationFailed { bytes: u64 },
    /// The source does not have the bytes.
    Missing,
}

impl TransferOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::AlreadyPresent | Self::Transferred { .. })
    }

    pub fn bytes(&self) -> u64 {
        match self {
            Self::Transferred { bytes } | Self::ValidationFailed { bytes } => *bytes,
            Self::AlreadyPresent | Self::Missing => 0,
        }
    }
}

/// Copy the bytes of `hash` from `source` to `dest`, resuming from whatever
/// `dest` already holds.
///
/// Chunks of at most `chunk_size` bytes go out in increasing offset order,
/// then `dest` validates the whole blob.
pub async fn transfer_bytes(
    source: &dyn RemoteStore,
    dest: &dyn RemoteStore,
    hash: &ContentHash,
    chunk_size: usize,
) -> SyncResult<TransferOutcome> {
    let total = source.has_bytes(hash).await?;
    if total == 0 && !hash.is_empty_sentinel() {
        warn!(%hash, "source has no bytes for hash");
        return Ok(TransferOutcome::Missing);
    }
    let mut offset = dest.has_bytes(hash).await?;
    if offset >= total {
        return Ok(TransferOutcome::AlreadyPresent);
    }

    let start = offset;
    let chunk = chunk_size.max(1) as u64;
    while offset < total {
        let length = chunk.min(total - offset);
        let data = match source.read_bytes(hash, offset, length).await? {
            Some(data) if !data.is_empty() => data,
            _ => {
                warn!(%hash, offset, "source read came back short");
                return Ok(TransferOutcome::Missing);
            }
        };
        let len = data.len() as u64;
        dest.put_bytes(hash, offset, data).await?;
        offset += len;
    }

    let bytes = offset - start;
    if dest.validate_bytes(hash).await? {
        debug!(%hash, bytes, resumed_at = start, "transferred");
        Ok(TransferOutcome::Transferred { bytes })
    } else {
        warn!(%hash, bytes, "destination rejected transferred bytes");
        Ok(TransferOutcome::ValidationFailed { bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::tests::memory_store;
    use bytes::Bytes;
    use hb_crypto::ContentHasher;

    async fn seed(store: &dyn RemoteStore, data: &'static [u8]) -> ContentHash {
        let hash = ContentHasher::hash(data);
        store.put_bytes(&hash, 0, Bytes::from_static(data)).await.unwrap();
        assert!(store.validate_bytes(&hash).await.unwrap());
        hash
    }

    #[tokio::test]
    async fn transfers_in_chunks() {
        let (src, dst) = (memory_store(), memory_store());
        let hash = seed(&src, b"0123456789abcdef").await;

        let outcome = transfer_bytes(&src, &dst, &hash, 3).await.unwrap();
        assert_eq!(outcome, TransferOutcome::Transferred { bytes: 16 });
        assert_eq!(dst.has_bytes(&hash).await.unwrap(), 16);

        let again = transfer_bytes(&src, &dst, &hash, 3).await.unwrap();
        assert_eq!(again, TransferOutcome::AlreadyPresent);
    }

    #[tokio::test]
    async fn resumes_partial_blob() {
        let (src, dst) = (memory_store(), memory_store());
        let hash = seed(&src, b"resumable payload").await;
        dst.put_bytes(&hash, 0, Bytes::from_static(b"resum")).await.unwrap();

        let outcome = transfer_bytes(&src, &dst, &hash, 4).await.unwrap();
        assert_eq!(outcome, TransferOutcome::Transferred { bytes: 12 });
        assert!(dst.validate_bytes(&hash).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_source_fails_validation() {
        let (src, dst) = (memory_store(), memory_store());
        let hash = ContentHasher::hash(b"expected");
        src.put_bytes(&hash, 0, Bytes::from_static(b"tampered")).await.unwrap();

        let outcome = transfer_bytes(&src, &dst, &hash, 64).await.unwrap();
        assert_eq!(outcome, TransferOutcome::ValidationFailed { bytes: 8 });
        assert!(!outcome.is_ok());
        assert_eq!(dst.has_bytes(&hash).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_and_empty() {
        let (src, dst) = (memory_store(), memory_store());
        let unknown = ContentHasher::hash(b"absent");
        assert_eq!(
            transfer_bytes(&src, &dst, &unknown, 8).await.unwrap(),
            TransferOutcome::Missing
        );
        assert_eq!(
            transfer_bytes(&src, &dst, &ContentHash::EMPTY, 8).await.unwrap(),
            TransferOutcome::AlreadyPresent
        );
    }
}
