use chrono::Utc;
use hb_ledger::SourceStore;
use hb_types::ContentHash;
use tracing::info;

use crate::error::{MergeError, MergeResult};
use crate::tree::TreeNode;

/// Merge the stored directory `dir_hash` into `path` of `source`'s current
/// snapshot and commit the result.
///
/// Missing directories along `path` are created. `path` is `/`-separated;
/// an empty path merges into the root. Names where a file meets a directory
/// keep the existing entry and the rest of the tree is still merged. A file
/// standing where `path` needs a directory aborts the merge with
/// [`MergeError::TypeConflict`]. Returns the new commit hash, or the current
/// one if the merge changed nothing.
pub fn commit_directory_into_path(
    store: &SourceStore,
    source: &str,
    path: &str,
    dir_hash: &ContentHash,
    recursive: bool,
) -> MergeResult<ContentHash> {
    let repo = store.objects().as_ref();
    let incoming = store
        .get_directory_descriptor(dir_hash)
        .ok_or(MergeError::DescriptorNotFound(*dir_hash))?;

    let state = store.get_source_state(source)?;
    let mut root = match state.current_commit_sha {
        Some(commit_sha) => {
            let commit = store
                .get_commit(&commit_sha)
                .ok_or(hb_ledger::LedgerError::CommitNotFound(commit_sha))?;
            TreeNode::from_hash(commit.directory_descriptor_sha)
        }
        None => TreeNode::empty(),
    };

    let now = Utc::now().timestamp_millis();
    let mut node = &mut root;
    let mut walked = String::new();
    for component in path.split('/').filter(|c| !c.is_empty()) {
        if !walked.is_empty() {
            walked.push('/');
        }
        walked.push_str(component);
        node = node.child(component, &walked, repo, now)?;
    }

    let stats = node.merge_descriptor(&incoming, recursive, repo, &walked)?;
    let root_hash = root.store(repo)?;

    let commit = match store.register_new_commit(source, &root_hash)? {
        Some(commit) => commit,
        None => state
            .current_commit_sha
            .ok_or(MergeError::DescriptorNotFound(root_hash))?,
    };
    info!(
        %source,
        path = %walked,
        added = stats.added,
        replaced = stats.replaced,
        skipped = stats.skipped,
        conflicts = stats.conflicts,
        commit = %commit.short_hex(),
        "merged directory"
    );
    Ok(commit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use hb_crypto::ContentHasher;
    use hb_ledger::LedgerConfig;
    use hb_refs::InMemoryRefStore;
    use hb_store::{InMemoryObjectRepository, ObjectRepositoryExt};
    use hb_types::{DirectoryDescriptor, FileDescriptor};

    fn store() -> SourceStore {
        SourceStore::new(
            Arc::new(InMemoryObjectRepository::new()),
            Arc::new(InMemoryRefStore::new()),
            LedgerConfig::default(),
        )
        .unwrap()
    }

    fn file(name: &str, content: &[u8]) -> FileDescriptor {
        FileDescriptor::file(name, content.len() as u64, 0, ContentHasher::hash(content))
    }

    fn tree_at(store: &SourceStore, commit: &ContentHash, path: &[&str]) -> DirectoryDescriptor {
        let mut hash = store.get_commit(commit).unwrap().directory_descriptor_sha;
        for part in path {
            let dir = store.get_directory_descriptor(&hash).unwrap();
            hash = dir.get(part).unwrap().content_sha.unwrap();
        }
        store.get_directory_descriptor(&hash).unwrap()
    }

    #[test]
    fn merges_into_new_path_of_new_source() {
        let store = store();
        let photos = store
            .objects()
            .store_object(&DirectoryDescriptor::new(vec![file("cat.jpg", b"meow")]))
            .unwrap();

        let commit = commit_directory_into_path(&store, "s", "media/photos", &photos, false).unwrap();
        assert_eq!(store.get_source_state("s").unwrap().current_commit_sha, Some(commit));
        let dir = tree_at(&store, &commit, &["media", "photos"]);
        assert!(dir.get("cat.jpg").is_some());
    }

    #[test]
    fn second_merge_chains_and_keeps_siblings() {
        let store = store();
        let first = store
            .objects()
            .store_object(&DirectoryDescriptor::new(vec![file("a", b"a")]))
            .unwrap();
        let second = store
            .objects()
            .store_object(&DirectoryDescriptor::new(vec![file("b", b"b")]))
            .unwrap();

        let c1 = commit_directory_into_path(&store, "s", "x", &first, false).unwrap();
        let c2 = commit_directory_into_path(&store, "s", "y", &second, false).unwrap();
        assert_eq!(store.get_commit(&c2).unwrap().parent_sha, Some(c1));

        let root = tree_at(&store, &c2, &[]);
        assert!(root.get("x").is_some());
        assert!(root.get("y").is_some());
    }

    #[test]
    fn unchanged_merge_returns_current_commit() {
        let store = store();
        let dir = store
            .objects()
            .store_object(&DirectoryDescriptor::new(vec![file("a", b"a")]))
            .unwrap();
        let c1 = commit_directory_into_path(&store, "s", "", &dir, false).unwrap();
        let c2 = commit_directory_into_path(&store, "s", "", &dir, false).unwrap();
        assert_eq!(c1, c2);
        assert_eq!(store.history("s", None).unwrap().len(), 1);
    }

    #[test]
    fn colliding_name_keeps_existing_and_merges_siblings() {
        let store = store();
        let sub = store
            .objects()
            .store_object(&DirectoryDescriptor::new(vec![file("inner", b"i")]))
            .unwrap();
        let with_dir = store
            .objects()
            .store_object(&DirectoryDescriptor::new(vec![FileDescriptor::directory("x", 0, sub)]))
            .unwrap();
        let c1 = commit_directory_into_path(&store, "s", "d", &with_dir, false).unwrap();

        let incoming = store
            .objects()
            .store_object(&DirectoryDescriptor::new(vec![
                file("x", b"file"),
                file("new.txt", b"new"),
            ]))
            .unwrap();
        let c2 = commit_directory_into_path(&store, "s", "d", &incoming, true).unwrap();
        assert_ne!(c1, c2);
        assert_eq!(store.get_source_state("s").unwrap().current_commit_sha, Some(c2));

        let d = tree_at(&store, &c2, &["d"]);
        assert!(d.get("x").unwrap().is_directory);
        assert!(d.get("new.txt").is_some());
    }

    #[test]
    fn path_through_file_leaves_source_untouched() {
        let store = store();
        let with_file = store
            .objects()
            .store_object(&DirectoryDescriptor::new(vec![file("x", b"file")]))
            .unwrap();
        let c1 = commit_directory_into_path(&store, "s", "", &with_file, false).unwrap();

        let other = store
            .objects()
            .store_object(&DirectoryDescriptor::new(vec![file("y", b"y")]))
            .unwrap();
        let err = commit_directory_into_path(&store, "s", "x/sub", &other, true).unwrap_err();
        assert!(matches!(err, MergeError::TypeConflict { path } if path == "x"));
        assert_eq!(store.get_source_state("s").unwrap().current_commit_sha, Some(c1));
    }

    #[test]
    fn unknown_descriptor_is_rejected() {
        let store = store();
        let err = commit_directory_into_path(&store, "s", "", &ContentHasher::hash(b"?"), false)
            .unwrap_err();
        assert!(matches!(err, MergeError::DescriptorNotFound(_)));
    }
}
