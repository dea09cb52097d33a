//! Persistent path-to-hash cache.
//!
//! The cache file is a JSON object keyed by absolute path. An entry is only
//! trusted while the file's modification time and size still match what was
//! recorded; anything else is rehashed and the entry replaced.

use std::collections::BTreeMap;
use std::fs::{self, Metadata};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use hb_crypto::{ContentHasher, FileHasher};
use hb_types::{ContentHash, CACHE_FILE_NAME};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{IndexError, IndexResult};

/// Tuning for [`ShaCache`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaCacheConfig {
    /// Files larger than this flush the cache right after being hashed, so
    /// an interrupted run does not have to hash them again.
    pub large_file_threshold: u64,
}

impl Default for ShaCacheConfig {
    fn default() -> Self {
        Self {
            large_file_threshold: 64 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry {
    modified_nanos: u64,
    size: u64,
    sha: ContentHash,
}

#[derive(Default)]
struct CacheState {
    entries: BTreeMap<String, CacheEntry>,
    dirty: bool,
}

/// Hash cache stored as `<root>/.hb-cache`.
pub struct ShaCache {
    path: PathBuf,
    config: ShaCacheConfig,
    state: Mutex<CacheState>,
}

impl ShaCache {
    /// Load the cache of `root`, starting empty if there is none.
    ///
    /// An unreadable cache file is discarded with a warning; the cache only
    /// ever saves work.
    pub fn open(root: &Path, config: ShaCacheConfig) -> IndexResult<Self> {
        let path = root.join(CACHE_FILE_NAME);
        let entries = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discarding unreadable hash cache");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = entries.len(), "opened hash cache");
        Ok(Self {
            path,
            config,
            state: Mutex::new(CacheState {
                entries,
                dirty: false,
            }),
        })
    }

    /// Location of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hash the file at `path`, reusing the cached value when the file is
    /// unchanged.
    pub fn hash_path(&self, path: &Path) -> IndexResult<ContentHash> {
        if !path.is_absolute() {
            return Err(IndexError::InvalidPath(format!(
                "hash cache needs an absolute path, got {}",
                path.display()
            )));
        }
        let key = path
            .to_str()
            .ok_or_else(|| IndexError::InvalidPath(path.display().to_string()))?
            .to_string();

        let meta = fs::metadata(path)?;
        let modified_nanos = modified_nanos(&meta);
        let size = meta.len();

        if let Some(hit) = self.lock()?.entries.get(&key) {
            if hit.modified_nanos == modified_nanos && hit.size == size {
                return Ok(hit.sha);
            }
        }

        let sha = ContentHasher::hash_file(path)?;
        {
            let mut state = self.lock()?;
            state.entries.insert(
                key,
                CacheEntry {
                    modified_nanos,
                    size,
                    sha,
                },
            );
            state.dirty = true;
        }

        if size > self.config.large_file_threshold {
            self.flush()?;
        }
        Ok(sha)
    }

    /// Write the cache to disk if it changed since the last flush.
    pub fn flush(&self) -> IndexResult<()> {
        let mut state = self.lock()?;
        if !state.dirty {
            return Ok(());
        }
        let dir = self
            .path
            .parent()
            .ok_or_else(|| IndexError::InvalidPath(self.path.display().to_string()))?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&serde_json::to_vec(&state.entries)?)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        state.dirty = false;
        debug!(path = %self.path.display(), entries = state.entries.len(), "flushed hash cache");
        Ok(())
    }

    fn lock(&self) -> IndexResult<MutexGuard<'_, CacheState>> {
        self.state.lock().map_err(|_| IndexError::LockPoisoned)
    }
}

impl FileHasher for ShaCache {
    fn hash_file(&self, path: &Path) -> io::Result<ContentHash> {
        self.hash_path(path).map_err(|e| match e {
            IndexError::Io(io) => io,
            other => io::Error::other(other),
        })
    }
}

impl Drop for ShaCache {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(path = %self.path.display(), error = %e, "failed to flush hash cache");
        }
    }
}

/// Modification time in milliseconds since the Unix epoch (0 if unknown).
pub fn modified_millis(meta: &Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_millis() as i64)
}

fn modified_nanos(meta: &Metadata) -> u64 {
    meta.modified()
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}
