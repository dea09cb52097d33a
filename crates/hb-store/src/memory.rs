use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use hb_crypto::ContentHasher;
use hb_types::ContentHash;

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectRepository;

/// In-memory object repository backed by a `HashMap`.
///
/// Mirrors the filesystem backend's semantics (partial writes, quarantine on
/// failed validation) and counts written bytes so transfer tests can assert
/// on how much data actually moved.
#[derive(Default)]
pub struct InMemoryObjectRepository {
    blobs: RwLock<HashMap<ContentHash, Vec<u8>>>,
    quarantined: RwLock<Vec<ContentHash>>,
    bytes_written: AtomicU64,
}

impl InMemoryObjectRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs, validated or not.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hashes of all stored blobs.
    pub fn hashes(&self) -> Vec<ContentHash> {
        let mut out: Vec<ContentHash> = self
            .blobs
            .read()
            .map(|b| b.keys().copied().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    /// Total payload bytes accepted by `put_bytes` so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Hashes whose blobs failed validation and were discarded.
    pub fn quarantined(&self) -> Vec<ContentHash> {
        self.quarantined.read().map(|q| q.clone()).unwrap_or_default()
    }

    /// Store bytes under `hash` without any checks.
    pub fn insert_raw(&self, hash: ContentHash, bytes: Vec<u8>) -> StoreResult<()> {
        self.blobs
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?
            .insert(hash, bytes);
        Ok(())
    }

    fn slice(&self, hash: &ContentHash, start: u64, end: Option<u64>) -> StoreResult<Option<Vec<u8>>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        Ok(blobs.get(hash).map(|data| {
            let len = data.len();
            let start = (start as usize).min(len);
            let end = end.map_or(len, |e| (e as usize).min(len)).max(start);
            data[start..end].to_vec()
        }))
    }
}

impl ObjectRepository for InMemoryObjectRepository {
    fn has_bytes(&self, hash: &ContentHash) -> StoreResult<u64> {
        if hash.is_empty_sentinel() {
            return Ok(0);
        }
        let blobs = self
            .blobs
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        Ok(blobs.get(hash).map_or(0, |b| b.len() as u64))
    }

    fn put_bytes(&self, hash: &ContentHash, offset: u64, data: &[u8]) -> StoreResult<u64> {
        if hash.is_empty_sentinel() || data.is_empty() {
            return Ok(0);
        }
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        let blob = blobs.entry(*hash).or_default();
        let start = offset as usize;
        let end = start + data.len();
        if blob.len() < end {
            blob.resize(end, 0);
        }
        blob[start..end].copy_from_slice(data);
        self.bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(data.len() as u64)
    }

    fn validate_bytes(&self, hash: &ContentHash) -> StoreResult<bool> {
        if hash.is_empty_sentinel() {
            return Ok(true);
        }
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        let Some(data) = blobs.get(hash) else {
            return Ok(false);
        };
        if ContentHasher::verify(data, hash) {
            return Ok(true);
        }
        blobs.remove(hash);
        self.quarantined
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?
            .push(*hash);
        Ok(false)
    }

    fn close_handle(&self, _hash: &ContentHash) -> StoreResult<()> {
        Ok(())
    }

    fn read_bytes(
        &self,
        hash: &ContentHash,
        offset: u64,
        length: u64,
    ) -> StoreResult<Option<Vec<u8>>> {
        if hash.is_empty_sentinel() {
            return Ok(Some(Vec::new()));
        }
        self.slice(hash, offset, Some(offset.saturating_add(length)))
    }

    fn read_as_stream(
        &self,
        hash: &ContentHash,
        start: u64,
        end: Option<u64>,
    ) -> StoreResult<Option<Box<dyn Read + Send>>> {
        if hash.is_empty_sentinel() {
            return Ok(Some(Box::new(io::empty())));
        }
        Ok(self
            .slice(hash, start, end)?
            .map(|bytes| Box::new(Cursor::new(bytes)) as Box<dyn Read + Send>))
    }
}
