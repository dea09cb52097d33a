use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;

/// A single entry of a directory: a file or a subdirectory.
///
/// For files `content_sha` names the raw bytes; for directories it names the
/// [`DirectoryDescriptor`] object of the subdirectory. Legacy data may carry
/// entries without a hash; those are tolerated and skipped by transfers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Entry name (no path separators).
    pub name: String,
    /// Whether this entry is a subdirectory.
    pub is_directory: bool,
    /// File size in bytes. Directories report 0.
    pub size: u64,
    /// Last modification time in milliseconds since the Unix epoch.
    pub last_write: i64,
    /// Hash of the content this entry denotes.
    pub content_sha: Option<ContentHash>,
}

impl FileDescriptor {
    /// Create a descriptor for a regular file.
    pub fn file(name: impl Into<String>, size: u64, last_write: i64, sha: ContentHash) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            size,
            last_write,
            content_sha: Some(sha),
        }
    }

    /// Create a descriptor for a subdirectory whose descriptor hashes to `sha`.
    pub fn directory(name: impl Into<String>, last_write: i64, sha: ContentHash) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
            size: 0,
            last_write,
            content_sha: Some(sha),
        }
    }
}

/// One level of a tree, stored as an object under its own content hash.
///
/// Entries are kept sorted by name so that the canonical encoding, and with
/// it the hash, depends only on the entry set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryDescriptor {
    pub files: Vec<FileDescriptor>,
}

impl DirectoryDescriptor {
    /// Create a descriptor from entries in any order.
    pub fn new(mut files: Vec<FileDescriptor>) -> Self {
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Self { files }
    }

    /// Create an empty descriptor.
    pub fn empty() -> Self {
        Self { files: Vec::new() }
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&FileDescriptor> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if the descriptor has no entries.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over the subdirectory entries.
    pub fn directories(&self) -> impl Iterator<Item = &FileDescriptor> {
        self.files.iter().filter(|f| f.is_directory)
    }
}
