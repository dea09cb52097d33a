use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use hb_crypto::{ContentHasher, FileHasher};
use hb_types::ContentHash;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectRepository;

/// Suffix given to blobs that failed validation.
const QUARANTINE_EXT: &str = "bak";

type Handle = Arc<Mutex<File>>;

/// Filesystem-backed object repository.
///
/// Blobs live at `<root>/<first two hex chars>/<full hex>`. Each hash being
/// written has at most one open handle, kept in a table until the blob is
/// validated or explicitly closed.
pub struct FsObjectRepository {
    root: PathBuf,
    hasher: Arc<dyn FileHasher>,
    handles: Mutex<HashMap<ContentHash, Handle>>,
}

impl FsObjectRepository {
    /// Open (creating if needed) a repository rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            hasher: Arc::new(ContentHasher),
            handles: Mutex::new(HashMap::new()),
        })
    }

    /// Validate through `hasher` instead of rehashing every blob from disk.
    pub fn with_hasher(mut self, hasher: Arc<dyn FileHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk location of the blob for `hash`.
    pub fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        self.root.join(hash.shard()).join(hash.to_hex())
    }

    /// Number of write handles currently held open.
    pub fn open_handles(&self) -> usize {
        self.handles.lock().map(|h| h.len()).unwrap_or(0)
    }

    /// Hashes of every blob on disk, quarantined blobs excluded.
    pub fn list_objects(&self) -> StoreResult<Vec<ContentHash>> {
        let mut out = Vec::new();
        for shard in fs::read_dir(&self.root)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            for entry in fs::read_dir(shard.path())? {
                let entry = entry?;
                let name = entry.file_name();
                if let Some(hash) = name.to_str().and_then(|n| n.parse::<ContentHash>().ok()) {
                    out.push(hash);
                }
            }
        }
        out.sort();
        Ok(out)
    }

    fn lock_handles(&self) -> StoreResult<MutexGuard<'_, HashMap<ContentHash, Handle>>> {
        self.handles
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn handle_for(&self, hash: &ContentHash) -> StoreResult<Handle> {
        let mut handles = self.lock_handles()?;
        if let Some(handle) = handles.get(hash) {
            return Ok(Arc::clone(handle));
        }
        let path = self.blob_path(hash);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let handle = Arc::new(Mutex::new(file));
        handles.insert(*hash, Arc::clone(&handle));
        Ok(handle)
    }

    fn release(&self, hash: &ContentHash) -> StoreResult<()> {
        let handle = self.lock_handles()?.remove(hash);
        if let Some(handle) = handle {
            let file = handle
                .lock()
                .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
            file.sync_data()?;
        }
        Ok(())
    }

    fn open_existing(&self, hash: &ContentHash) -> StoreResult<Option<File>> {
        match File::open(self.blob_path(hash)) {
            Ok(f) => Ok(Some(f)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl ObjectRepository for FsObjectRepository {
    fn has_bytes(&self, hash: &ContentHash) -> StoreResult<u64> {
        if hash.is_empty_sentinel() {
            return Ok(0);
        }
        match fs::metadata(self.blob_path(hash)) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn put_bytes(&self, hash: &ContentHash, offset: u64, data: &[u8]) -> StoreResult<u64> {
        if hash.is_empty_sentinel() || data.is_empty() {
            return Ok(0);
        }
        let handle = self.handle_for(hash)?;
        let mut file = handle
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(data.len() as u64)
    }

    fn validate_bytes(&self, hash: &ContentHash) -> StoreResult<bool> {
        if hash.is_empty_sentinel() {
            return Ok(true);
        }
        self.release(hash)?;

        let path = self.blob_path(hash);
        if !path.exists() {
            return Ok(false);
        }
        let actual = self.hasher.hash_file(&path)?;
        if actual == *hash {
            return Ok(true);
        }

        let aside = path.with_extension(QUARANTINE_EXT);
        warn!(
            expected = %hash.short_hex(),
            actual = %actual.short_hex(),
            "blob failed validation, moving aside"
        );
        fs::rename(&path, &aside)?;
        Ok(false)
    }

    fn close_handle(&self, hash: &ContentHash) -> StoreResult<()> {
        if hash.is_empty_sentinel() {
            return Ok(());
        }
        self.release(hash)
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
        let Some(mut file) = self.open_existing(hash)? else {
            return Ok(None);
        };
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::new();
        file.take(length).read_to_end(&mut buf)?;
        Ok(Some(buf))
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
        let Some(mut file) = self.open_existing(hash)? else {
            return Ok(None);
        };
        file.seek(SeekFrom::Start(start))?;
        let reader = BufReader::new(file);
        debug!(hash = %hash.short_hex(), start, ?end, "streaming blob");
        Ok(Some(match end {
            Some(end) => Box::new(reader.take(end.saturating_sub(start))),
            None => Box::new(reader),
        }))
    }
}
