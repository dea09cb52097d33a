use std::collections::BTreeMap;

use hb_store::{ObjectRepository, ObjectRepositoryExt};
use hb_types::{ContentHash, DirectoryDescriptor, FileDescriptor};
use tracing::{debug, warn};

use crate::error::{MergeError, MergeResult};

/// Counters from one merge.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub replaced: usize,
    pub skipped: usize,
    /// Names where a file met a directory; the existing entry was kept.
    pub conflicts: usize,
}

/// One directory of a snapshot, loaded on demand.
///
/// A node starts as a bare hash. Its entries are read from the repository
/// the first time they are needed, and subdirectories become child nodes
/// only when something descends into them. Untouched subtrees keep their
/// original hash and are never read.
#[derive(Debug, Default)]
pub struct TreeNode {
    origin: Option<ContentHash>,
    entries: Option<BTreeMap<String, FileDescriptor>>,
    children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    /// A node standing for the stored descriptor `hash`.
    pub fn from_hash(hash: ContentHash) -> Self {
        Self {
            origin: Some(hash),
            ..Self::default()
        }
    }

    /// A new, empty directory.
    pub fn empty() -> Self {
        Self {
            entries: Some(BTreeMap::new()),
            ..Self::default()
        }
    }

    /// Returns `true` once the entries have been read.
    pub fn is_loaded(&self) -> bool {
        self.entries.is_some()
    }

    fn entries_mut(
        &mut self,
        repo: &dyn ObjectRepository,
    ) -> MergeResult<&mut BTreeMap<String, FileDescriptor>> {
        if self.entries.is_none() {
            let loaded = match self.origin {
                Some(hash) => {
                    let desc: DirectoryDescriptor = repo
                        .read_object(&hash)?
                        .ok_or(MergeError::DescriptorNotFound(hash))?;
                    desc.files.into_iter().map(|f| (f.name.clone(), f)).collect()
                }
                None => BTreeMap::new(),
            };
            self.entries = Some(loaded);
        }
        Ok(self.entries.get_or_insert_with(BTreeMap::new))
    }

    /// The subdirectory `name`, created empty when absent.
    ///
    /// `path` is the subdirectory's full path, used in conflict reports.
    pub fn child(
        &mut self,
        name: &str,
        path: &str,
        repo: &dyn ObjectRepository,
        last_write: i64,
    ) -> MergeResult<&mut TreeNode> {
        let entries = self.entries_mut(repo)?;
        let node = match entries.get(name) {
            Some(entry) if !entry.is_directory => {
                return Err(MergeError::TypeConflict {
                    path: path.to_string(),
                });
            }
            Some(entry) => match entry.content_sha {
                Some(hash) => TreeNode::from_hash(hash),
                None => TreeNode::empty(),
            },
            None => {
                // The hash is filled in when the node is written back.
                entries.insert(
                    name.to_string(),
                    FileDescriptor::directory(name, last_write, ContentHash::EMPTY),
                );
                TreeNode::empty()
            }
        };
        Ok(self.children.entry(name.to_string()).or_insert(node))
    }

    /// Merge the entries of `incoming` into this directory.
    ///
    /// Absent names are added. Entries with the same type and hash are left
    /// alone. Files replace files. Directories are merged into directories
    /// when `recursive` is set and left alone otherwise. A file meeting a
    /// directory under one name keeps the existing entry and is counted in
    /// [`MergeStats::conflicts`]; the remaining entries are still merged.
    pub fn merge_descriptor(
        &mut self,
        incoming: &DirectoryDescriptor,
        recursive: bool,
        repo: &dyn ObjectRepository,
        path: &str,
    ) -> MergeResult<MergeStats> {
        let mut stats = MergeStats::default();
        for entry in &incoming.files {
            let entry_path = join(path, &entry.name);
            let existing = self.entries_mut(repo)?.get(&entry.name).cloned();
            match existing {
                None => {
                    self.entries_mut(repo)?.insert(entry.name.clone(), entry.clone());
                    self.children.remove(&entry.name);
                    stats.added += 1;
                }
                Some(current)
                    if current.is_directory == entry.is_directory
                        && current.content_sha == entry.content_sha =>
                {
                    stats.skipped += 1;
                }
                Some(current) if current.is_directory != entry.is_directory => {
                    warn!(
                        path = %entry_path,
                        existing_is_directory = current.is_directory,
                        "file and directory share a name, keeping existing entry"
                    );
                    stats.conflicts += 1;
                }
                Some(_) if !entry.is_directory => {
                    self.entries_mut(repo)?.insert(entry.name.clone(), entry.clone());
                    stats.replaced += 1;
                }
                Some(_) if recursive => {
                    let Some(sub_hash) = entry.content_sha else {
                        stats.skipped += 1;
                        continue;
                    };
                    let sub: DirectoryDescriptor = repo
                        .read_object(&sub_hash)?
                        .ok_or(MergeError::DescriptorNotFound(sub_hash))?;
                    let child = self.child(&entry.name, &entry_path, repo, entry.last_write)?;
                    let sub_stats = child.merge_descriptor(&sub, true, repo, &entry_path)?;
                    stats.added += sub_stats.added;
                    stats.replaced += sub_stats.replaced;
                    stats.skipped += sub_stats.skipped;
                    stats.conflicts += sub_stats.conflicts;
                }
                Some(_) => {
                    debug!(path = %entry_path, "existing directory kept (non-recursive merge)");
                    stats.skipped += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Write touched nodes back as descriptors and return this node's hash.
    ///
    /// Nodes that were never loaded keep their original hash.
    pub fn store(&mut self, repo: &dyn ObjectRepository) -> MergeResult<ContentHash> {
        let mut child_hashes = Vec::with_capacity(self.children.len());
        for (name, child) in self.children.iter_mut() {
            child_hashes.push((name.clone(), child.store(repo)?));
        }

        let Some(entries) = self.entries.as_mut() else {
            return match self.origin {
                Some(hash) => Ok(hash),
                None => Ok(repo.store_object(&DirectoryDescriptor::empty())?),
            };
        };
        for (name, hash) in child_hashes {
            if let Some(entry) = entries.get_mut(&name) {
                entry.content_sha = Some(hash);
            }
        }
        let desc = DirectoryDescriptor::new(entries.values().cloned().collect());
        let hash = repo.store_object(&desc)?;
        self.origin = Some(hash);
        Ok(hash)
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}
