use std::io::Read;

use hb_crypto::hash_canonical;
use hb_types::ContentHash;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};

/// Content-addressed byte repository with resumable writes.
///
/// All implementations must satisfy these invariants:
/// - `has_bytes` reports how many bytes are currently stored for a hash,
///   validated or not; callers resume writes from that offset.
/// - A blob only counts as present after `validate_bytes` returned `true`.
/// - The empty-payload sentinel ([`ContentHash::EMPTY`]) has length 0, reads
///   back empty, validates, and ignores writes.
/// - Missing blobs read as `Ok(None)`.
pub trait ObjectRepository: Send + Sync {
    /// Number of bytes currently stored for `hash` (0 if unknown).
    fn has_bytes(&self, hash: &ContentHash) -> StoreResult<u64>;

    /// Write `data` at `offset` of the blob for `hash`, returning the number
    /// of bytes written.
    ///
    /// Reuses the open write handle for the hash if there is one. Rewriting a
    /// range with the same bytes is harmless; overlapping or out-of-order
    /// writes from competing producers are the caller's problem.
    fn put_bytes(&self, hash: &ContentHash, offset: u64, data: &[u8]) -> StoreResult<u64>;

    /// Close any open handle, re-hash the stored bytes and compare.
    ///
    /// On mismatch the blob is moved aside and `false` is returned.
    fn validate_bytes(&self, hash: &ContentHash) -> StoreResult<bool>;

    /// Close the open write handle for `hash` without validating.
    fn close_handle(&self, hash: &ContentHash) -> StoreResult<()>;

    /// Read up to `length` bytes starting at `offset`.
    fn read_bytes(&self, hash: &ContentHash, offset: u64, length: u64)
        -> StoreResult<Option<Vec<u8>>>;

    /// Open a reader over `[start, end)`; `end = None` reads to the end.
    fn read_as_stream(
        &self,
        hash: &ContentHash,
        start: u64,
        end: Option<u64>,
    ) -> StoreResult<Option<Box<dyn Read + Send>>>;
}

/// JSON object helpers layered over the byte API.
pub trait ObjectRepositoryExt: ObjectRepository {
    /// Read the whole blob for `hash`.
    fn read_all(&self, hash: &ContentHash) -> StoreResult<Option<Vec<u8>>> {
        if hash.is_empty_sentinel() {
            return Ok(Some(Vec::new()));
        }
        let len = self.has_bytes(hash)?;
        if len == 0 {
            return Ok(None);
        }
        self.read_bytes(hash, 0, len)
    }

    /// Serialize `value` canonically, store it, and return its hash.
    ///
    /// Storing an object that is already fully present is a no-op.
    fn store_object<T: Serialize + ?Sized>(&self, value: &T) -> StoreResult<ContentHash> {
        let (hash, bytes) = hash_canonical(value)?;
        if self.has_bytes(&hash)? == bytes.len() as u64 {
            return Ok(hash);
        }
        self.put_bytes(&hash, 0, &bytes)?;
        if !self.validate_bytes(&hash)? {
            return Err(StoreError::CorruptObject {
                hash,
                reason: "stored bytes failed validation".into(),
            });
        }
        Ok(hash)
    }

    /// Fetch and deserialize the object stored under `hash`.
    fn read_object<T: DeserializeOwned>(&self, hash: &ContentHash) -> StoreResult<Option<T>> {
        let Some(bytes) = self.read_all(hash)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::CorruptObject {
                hash: *hash,
                reason: e.to_string(),
            })
    }
}

impl<R: ObjectRepository + ?Sized> ObjectRepositoryExt for R {}
