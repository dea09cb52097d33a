//! Tree-level diff: compare two directory descriptors and list the changes.
//!
//! Entries are compared by name. Where both sides hold a directory with
//! different hashes the comparison descends into it; every other difference
//! is reported at the entry itself. Files that disappear under one name and
//! appear under another in the same directory with the same hash are
//! reported as renames.

use std::collections::{BTreeMap, HashSet};

use hb_store::{ObjectRepository, ObjectRepositoryExt};
use hb_types::{Commit, ContentHash, DirectoryDescriptor, FileDescriptor};
use serde::Serialize;
use tracing::debug;

use crate::error::{DiffError, DiffResult};

/// The result of comparing two trees.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TreeDiff {
    pub changes: Vec<TreeChange>,
}

impl TreeDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

/// A single change between two trees. Paths are `/`-joined from the root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeChange {
    Added {
        path: String,
        new_sha: Option<ContentHash>,
        is_directory: bool,
    },
    Deleted {
        path: String,
        old_sha: Option<ContentHash>,
        is_directory: bool,
    },
    /// A file's content changed.
    Modified {
        path: String,
        old_sha: Option<ContentHash>,
        new_sha: Option<ContentHash>,
    },
    /// A file became a directory or the other way round.
    TypeChanged {
        path: String,
        old_sha: Option<ContentHash>,
        new_sha: Option<ContentHash>,
        now_directory: bool,
    },
    /// A file moved within its directory without changing content.
    Renamed {
        old_path: String,
        new_path: String,
        sha: ContentHash,
    },
}

impl TreeChange {
    /// The path the change applies to (the new path for renames).
    pub fn path(&self) -> &str {
        match self {
            Self::Added { path, .. }
            | Self::Deleted { path, .. }
            | Self::Modified { path, .. }
            | Self::TypeChanged { path, .. } => path,
            Self::Renamed { new_path, .. } => new_path,
        }
    }

    /// One-letter status code, as in `git diff --name-status`.
    pub fn code(&self) -> char {
        match self {
            Self::Added { .. } => 'A',
            Self::Deleted { .. } => 'D',
            Self::Modified { .. } => 'M',
            Self::TypeChanged { .. } => 'T',
            Self::Renamed { .. } => 'R',
        }
    }
}

/// Compare two stored directory descriptors recursively.
///
/// `old = None` compares against an empty tree.
pub fn diff_directories(
    repo: &dyn ObjectRepository,
    old: Option<&ContentHash>,
    new: &ContentHash,
) -> DiffResult<TreeDiff> {
    let old_desc = match old {
        Some(h) => load_descriptor(repo, h)?,
        None => DirectoryDescriptor::empty(),
    };
    let new_desc = load_descriptor(repo, new)?;

    let mut changes = Vec::new();
    diff_level(Some(repo), "", &old_desc, &new_desc, &mut changes)?;
    debug!(new = %new.short_hex(), changes = changes.len(), "diffed directories");
    Ok(TreeDiff { changes })
}

/// Compare the trees of two commits. `old = None` compares against nothing.
pub fn diff_commits(
    repo: &dyn ObjectRepository,
    old: Option<&ContentHash>,
    new: &ContentHash,
) -> DiffResult<TreeDiff> {
    let old_tree = match old {
        Some(h) => Some(load_commit(repo, h)?.directory_descriptor_sha),
        None => None,
    };
    let new_tree = load_commit(repo, new)?.directory_descriptor_sha;
    diff_directories(repo, old_tree.as_ref(), &new_tree)
}

/// Compare two descriptors held in memory, one level only.
pub fn diff_descriptors(old: Option<&DirectoryDescriptor>, new: &DirectoryDescriptor) -> TreeDiff {
    let empty = DirectoryDescriptor::empty();
    let mut changes = Vec::new();
    // Without a repository nothing is loaded, so this cannot fail.
    let _ = diff_level(None, "", old.unwrap_or(&empty), new, &mut changes);
    TreeDiff { changes }
}

fn load_descriptor(repo: &dyn ObjectRepository, hash: &ContentHash) -> DiffResult<DirectoryDescriptor> {
    repo.read_object(hash)?
        .ok_or(DiffError::DescriptorNotFound(*hash))
}

fn load_commit(repo: &dyn ObjectRepository, hash: &ContentHash) -> DiffResult<Commit> {
    repo.read_object(hash)?.ok_or(DiffError::CommitNotFound(*hash))
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

fn diff_level(
    repo: Option<&dyn ObjectRepository>,
    prefix: &str,
    old: &DirectoryDescriptor,
    new: &DirectoryDescriptor,
    changes: &mut Vec<TreeChange>,
) -> DiffResult<()> {
    let old_map: BTreeMap<&str, &FileDescriptor> =
        old.files.iter().map(|f| (f.name.as_str(), f)).collect();
    let new_map: BTreeMap<&str, &FileDescriptor> =
        new.files.iter().map(|f| (f.name.as_str(), f)).collect();

    let mut deleted = Vec::new();
    let mut added = Vec::new();

    for (name, old_entry) in &old_map {
        let Some(new_entry) = new_map.get(name) else {
            deleted.push(*old_entry);
            continue;
        };
        if old_entry.content_sha == new_entry.content_sha
            && old_entry.is_directory == new_entry.is_directory
        {
            continue;
        }
        let path = join(prefix, name);
        match (old_entry.is_directory, new_entry.is_directory) {
            (true, true) => match (repo, old_entry.content_sha, new_entry.content_sha) {
                (Some(repo), Some(o), Some(n)) => {
                    let old_sub = load_descriptor(repo, &o)?;
                    let new_sub = load_descriptor(repo, &n)?;
                    diff_level(Some(repo), &path, &old_sub, &new_sub, changes)?;
                }
                _ => changes.push(TreeChange::Modified {
                    path,
                    old_sha: old_entry.content_sha,
                    new_sha: new_entry.content_sha,
                }),
            },
            (false, false) => changes.push(TreeChange::Modified {
                path,
                old_sha: old_entry.content_sha,
                new_sha: new_entry.content_sha,
            }),
            (_, now_directory) => changes.push(TreeChange::TypeChanged {
                path,
                old_sha: old_entry.content_sha,
                new_sha: new_entry.content_sha,
                now_directory,
            }),
        }
    }

    for (name, new_entry) in &new_map {
        if !old_map.contains_key(name) {
            added.push(*new_entry);
        }
    }

    // Exact renames: same file hash, different name.
    let mut matched_deletes = HashSet::new();
    let mut matched_adds = HashSet::new();
    for (di, del) in deleted.iter().enumerate() {
        if del.is_directory {
            continue;
        }
        let Some(sha) = del.content_sha else { continue };
        let found = added.iter().enumerate().find(|(ai, add)| {
            !add.is_directory && add.content_sha == Some(sha) && !matched_adds.contains(ai)
        });
        if let Some((ai, add)) = found {
            changes.push(TreeChange::Renamed {
                old_path: join(prefix, &del.name),
                new_path: join(prefix, &add.name),
                sha,
            });
            matched_deletes.insert(di);
            matched_adds.insert(ai);
        }
    }

    for (di, del) in deleted.iter().enumerate() {
        if !matched_deletes.contains(&di) {
            changes.push(TreeChange::Deleted {
                path: join(prefix, &del.name),
                old_sha: del.content_sha,
                is_directory: del.is_directory,
            });
        }
    }
    for (ai, add) in added.iter().enumerate() {
        if !matched_adds.contains(&ai) {
            changes.push(TreeChange::Added {
                path: join(prefix, &add.name),
                new_sha: add.content_sha,
                is_directory: add.is_directory,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_store::InMemoryObjectRepository;

    fn sha(b: u8) -> ContentHash {
        ContentHash::from_digest([b; 32])
    }

    fn file(name: &str, b: u8) -> FileDescriptor {
        FileDescriptor::file(name, 1, 0, sha(b))
    }

    #[test]
    fn empty_to_populated_all_additions() {
        let new = DirectoryDescriptor::new(vec![file("a.txt", 1), file("b.txt", 2)]);
        let diff = diff_descriptors(None, &new);
        assert_eq!(diff.len(), 2);
        assert!(diff.changes.iter().all(|c| matches!(c, TreeChange::Added { .. })));
    }

    #[test]
    fn identical_trees_no_changes() {
        let tree = DirectoryDescriptor::new(vec![file("file.txt", 1)]);
        assert!(diff_descriptors(Some(&tree), &tree).is_empty());
    }

    #[test]
    fn rename_detection_exact_match() {
        let old = DirectoryDescriptor::new(vec![file("old_name.txt", 1)]);
        let new = DirectoryDescriptor::new(vec![file("new_name.txt", 1)]);
        let diff = diff_descriptors(Some(&old), &new);
        assert_eq!(
            diff.changes,
            vec![TreeChange::Renamed {
                old_path: "old_name.txt".into(),
                new_path: "new_name.txt".into(),
                sha: sha(1),
            }]
        );
    }

    #[test]
    fn file_to_directory_is_type_change() {
        let old = DirectoryDescriptor::new(vec![file("x", 1)]);
        let new = DirectoryDescriptor::new(vec![FileDescriptor::directory("x", 0, sha(2))]);
        let diff = diff_descriptors(Some(&old), &new);
        assert_eq!(diff.len(), 1);
        assert!(matches!(
            &diff.changes[0],
            TreeChange::TypeChanged { now_directory: true, path, .. } if path == "x"
        ));
        assert_eq!(diff.changes[0].code(), 'T');
    }

    #[test]
    fn mixed_changes() {
        let old = DirectoryDescriptor::new(vec![
            file("keep.txt", 1),
            file("modify.txt", 2),
            file("delete.txt", 3),
        ]);
        let new = DirectoryDescriptor::new(vec![
            file("keep.txt", 1),
            file("modify.txt", 4),
            file("added.txt", 5),
        ]);
        let diff = diff_descriptors(Some(&old), &new);
        assert_eq!(diff.len(), 3);
        let codes: String = diff.changes.iter().map(TreeChange::code).collect();
        assert!(codes.contains('M') && codes.contains('D') && codes.contains('A'));
    }

    #[test]
    fn descends_into_changed_subdirectories() {
        let repo = InMemoryObjectRepository::new();
        let sub_old = repo
            .store_object(&DirectoryDescriptor::new(vec![file("c.txt", 1)]))
            .unwrap();
        let sub_new = repo
            .store_object(&DirectoryDescriptor::new(vec![file("c.txt", 2)]))
            .unwrap();
        let untouched = repo
            .store_object(&DirectoryDescriptor::new(vec![file("z", 9)]))
            .unwrap();

        let old = repo
            .store_object(&DirectoryDescriptor::new(vec![
                FileDescriptor::directory("b", 0, sub_old),
                FileDescriptor::directory("same", 0, untouched),
            ]))
            .unwrap();
        let new = repo
            .store_object(&DirectoryDescriptor::new(vec![
                FileDescriptor::directory("b", 0, sub_new),
                FileDescriptor::directory("same", 0, untouched),
            ]))
            .unwrap();

        let diff = diff_directories(&repo, Some(&old), &new).unwrap();
        assert_eq!(
            diff.changes,
            vec![TreeChange::Modified {
                path: "b/c.txt".into(),
                old_sha: Some(sha(1)),
                new_sha: Some(sha(2)),
            }]
        );
    }

    #[test]
    fn commits_compare_their_trees() {
        let repo = InMemoryObjectRepository::new();
        let t1 = repo
            .store_object(&DirectoryDescriptor::new(vec![file("a", 1)]))
            .unwrap();
        let t2 = repo
            .store_object(&DirectoryDescriptor::new(vec![file("a", 1), file("b", 2)]))
            .unwrap();
        let c1 = repo.store_object(&Commit::new(None, t1, 1)).unwrap();
        let c2 = repo.store_object(&Commit::new(Some(c1), t2, 2)).unwrap();

        let diff = diff_commits(&repo, Some(&c1), &c2).unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff.changes[0].path(), "b");

        let from_nothing = diff_commits(&repo, None, &c1).unwrap();
        assert_eq!(from_nothing.len(), 1);
    }

    #[test]
    fn missing_descriptor_is_error() {
        let repo = InMemoryObjectRepository::new();
        let err = diff_directories(&repo, None, &sha(7)).unwrap_err();
        assert!(matches!(err, DiffError::DescriptorNotFound(_)));
    }
}
