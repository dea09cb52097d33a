use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use hb_crypto::hash_canonical;
use hb_types::{is_reserved_name, ContentHash, DirectoryDescriptor, FileDescriptor};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{IndexError, IndexResult};
use crate::sha_cache::{modified_millis, ShaCache};

/// Where the bytes of an emitted entry can be read from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntrySource {
    /// A file in the browsed tree.
    File(PathBuf),
    /// A serialized directory descriptor held in memory.
    Bytes(Vec<u8>),
}

/// One entry found by the browser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrowseEvent {
    /// `/`-separated path relative to the browsed root.
    pub relative_path: String,
    pub descriptor: FileDescriptor,
}

impl BrowseEvent {
    pub fn hash(&self) -> Option<ContentHash> {
        self.descriptor.content_sha
    }

    /// Returns `true` for entries directly under the browsed root.
    pub fn is_top_level(&self) -> bool {
        !self.relative_path.contains('/')
    }
}

/// Depth-first tree walker producing descriptors bottom-up.
///
/// Every emitted entry is registered as "opened" until the consumer calls
/// [`close_entry`](Self::close_entry), so bytes can be fetched through
/// [`entry_source`](Self::entry_source) while the entry is in flight.
/// Identical content seen at several paths is registered once per sighting.
pub struct DirectoryBrowser {
    cache: Arc<ShaCache>,
    opened: Mutex<HashMap<ContentHash, (EntrySource, usize)>>,
}

struct Walk<'s> {
    sink: &'s mut dyn FnMut(BrowseEvent) -> bool,
    cancelled: bool,
}

impl DirectoryBrowser {
    pub fn new(cache: Arc<ShaCache>) -> Self {
        Self {
            cache,
            opened: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<ShaCache> {
        &self.cache
    }

    /// Walk `root`, emitting every file and subdirectory to `sink`, and return
    /// the hash of the root's directory descriptor.
    ///
    /// Files are emitted before the directory that contains them. The root
    /// itself is not emitted. Returning `false` from `sink` stops the walk
    /// with [`IndexError::Cancelled`].
    pub fn browse(
        &self,
        root: &Path,
        sink: &mut dyn FnMut(BrowseEvent) -> bool,
    ) -> IndexResult<ContentHash> {
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        let mut walk = Walk {
            sink,
            cancelled: false,
        };
        let result = self.browse_dir(&root, "", &mut walk);
        if let Err(e) = self.cache.flush() {
            warn!(error = %e, "failed to flush hash cache after browse");
        }
        if walk.cancelled {
            return Err(IndexError::Cancelled);
        }
        let (hash, _) = result?;
        debug!(root = %root.display(), hash = %hash.short_hex(), "browse complete");
        Ok(hash)
    }

    /// Bytes source for an entry that is still open.
    pub fn entry_source(&self, hash: &ContentHash) -> Option<EntrySource> {
        let opened = self.opened.lock().ok()?;
        opened.get(hash).map(|(source, _)| source.clone())
    }

    /// Release one registration of `hash`, returning its source when the last
    /// registration is gone.
    pub fn close_entry(&self, hash: &ContentHash) -> Option<EntrySource> {
        let mut opened = self.opened.lock().ok()?;
        let (_, count) = opened.get_mut(hash)?;
        *count -= 1;
        if *count == 0 {
            opened.remove(hash).map(|(source, _)| source)
        } else {
            None
        }
    }

    /// Number of distinct hashes currently open.
    pub fn open_entries(&self) -> usize {
        self.opened.lock().map(|o| o.len()).unwrap_or(0)
    }

    fn register(&self, hash: ContentHash, source: EntrySource) {
        if let Ok(mut opened) = self.opened.lock() {
            opened.entry(hash).or_insert((source, 0)).1 += 1;
        }
    }

    /// Walk one directory. Errors listing `dir` are returned to the caller,
    /// which decides whether they abort the browse (root) or only this
    /// subtree.
    fn browse_dir(
        &self,
        dir: &Path,
        relative: &str,
        walk: &mut Walk<'_>,
    ) -> IndexResult<(ContentHash, Vec<u8>)> {
        let mut files = Vec::new();

        let listing = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in listing {
            if walk.cancelled {
                break;
            }
            let entry = match entry {
                Ok(entry) => entry,
                // The directory itself could not be read.
                Err(err) if err.depth() == 0 => {
                    return Err(err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory listing failed"))
                        .into());
                }
                Err(err) => {
                    warn!(%err, dir = %dir.display(), "skipping unreadable entry");
                    continue;
                }
            };

            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!(path = %entry.path().display(), "skipping non UTF-8 name");
                continue;
            };
            if is_reserved_name(&name) {
                continue;
            }
            let file_type = entry.file_type();
            if file_type.is_symlink() {
                debug!(path = %entry.path().display(), "skipping symlink");
                continue;
            }

            let rel = if relative.is_empty() {
                name.clone()
            } else {
                format!("{relative}/{name}")
            };

            if file_type.is_dir() {
                let last_write = entry.metadata().map(|m| modified_millis(&m)).unwrap_or(0);
                match self.browse_dir(entry.path(), &rel, walk) {
                    Ok((hash, bytes)) => {
                        let descriptor = FileDescriptor::directory(name, last_write, hash);
                        files.push(descriptor.clone());
                        self.register(hash, EntrySource::Bytes(bytes));
                        self.emit(walk, rel, descriptor);
                    }
                    Err(IndexError::Cancelled) => walk.cancelled = true,
                    Err(e) => {
                        warn!(error = %e, path = %entry.path().display(), "skipping unreadable directory");
                    }
                }
            } else if file_type.is_file() {
                match self.describe_file(entry.path(), &name) {
                    Ok(descriptor) => {
                        if let Some(hash) = descriptor.content_sha {
                            self.register(hash, EntrySource::File(entry.path().to_path_buf()));
                        }
                        files.push(descriptor.clone());
                        self.emit(walk, rel, descriptor);
                    }
                    Err(e) => {
                        warn!(error = %e, path = %entry.path().display(), "skipping unreadable file");
                    }
                }
            }
        }

        if walk.cancelled {
            return Err(IndexError::Cancelled);
        }

        let (hash, bytes) = hash_canonical(&DirectoryDescriptor::new(files))?;
        Ok((hash, bytes))
    }

    fn describe_file(&self, path: &Path, name: &str) -> IndexResult<FileDescriptor> {
        let meta = fs::metadata(path)?;
        let sha = self.cache.hash_path(path)?;
        Ok(FileDescriptor::file(name, meta.len(), modified_millis(&meta), sha))
    }

    fn emit(&self, walk: &mut Walk<'_>, relative_path: String, descriptor: FileDescriptor) {
        if walk.cancelled {
            return;
        }
        let event = BrowseEvent {
            relative_path,
            descriptor,
        };
        if !(walk.sink)(event) {
            walk.cancelled = true;
        }
    }
}
