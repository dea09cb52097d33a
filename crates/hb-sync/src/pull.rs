use std::collections::HashSet;

use hb_types::{tags, ContentHash};
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStore;
use crate::transfer::transfer_bytes;
use crate::types::{PullOptions, PullResult, PullStatus};

/// Bring `dest`'s copy of `source_id` up to `source`'s current commit.
///
/// Missing commits are copied oldest first, each one only after its whole
/// tree is present and validated at `dest`. The destination pointer moves
/// at the end unless the destination source is tagged read-only or some
/// hash failed.
pub async fn pull(
    source: &dyn RemoteStore,
    dest: &dyn RemoteStore,
    source_id: &str,
    options: &PullOptions,
) -> SyncResult<PullResult> {
    let mut result = PullResult::default();
    let Some(head) = source.get_source_state(source_id).await?.current_commit_sha else {
        debug!(source = %source_id, "source has no commits");
        return Ok(result);
    };
    let dest_state = dest.get_source_state(source_id).await?;

    if dest_state.current_commit_sha == Some(head) && object_present(source, dest, &head).await? {
        debug!(source = %source_id, commit = %head.short_hex(), "up to date");
        return Ok(result);
    }

    result.status = match dest_state.current_commit_sha {
        None => PullStatus::Created,
        Some(current) if current == head => PullStatus::FastForward,
        Some(current) => {
            if in_history(source, &head, &current, options.max_conflict_depth).await? {
                PullStatus::FastForward
            } else if options.force {
                warn!(source = %source_id, dest_commit = %current, "overwriting divergent destination");
                PullStatus::Forced
            } else {
                return Err(SyncError::NotFastForward {
                    source_id: source_id.to_string(),
                    dest_commit: current,
                });
            }
        }
    };

    let mut missing = Vec::new();
    let mut next = Some(head);
    while let Some(hash) = next {
        if object_present(source, dest, &hash).await? {
            break;
        }
        let commit = source
            .get_commit(&hash)
            .await?
            .ok_or(SyncError::CommitNotFound(hash))?;
        next = commit.parent_sha;
        missing.push((hash, commit));
    }
    debug!(source = %source_id, commits = missing.len(), "commits to pull");

    let mut run = PullRun {
        source,
        dest,
        chunk_size: options.chunk_size,
        seen: HashSet::new(),
        result: &mut result,
    };
    for (hash, commit) in missing.iter().rev() {
        let failed_before = run.result.failed;
        run.pull_directory(commit.directory_descriptor_sha).await?;
        if run.result.failed > failed_before {
            warn!(source = %source_id, commit = %hash, "tree incomplete, stopping before commit");
            break;
        }
        if !run.transfer(hash).await? {
            break;
        }
        run.result.commits_transferred += 1;
    }

    if result.failed > 0 {
        warn!(source = %source_id, failed = result.failed, "pull incomplete, destination pointer unchanged");
        return Ok(result);
    }
    if dest_state.tag(tags::READONLY) {
        info!(source = %source_id, "destination is read-only, pointer unchanged");
        return Ok(result);
    }
    result.pointer_updated = dest.set_source_commit(source_id, &head).await?;
    info!(
        source = %source_id,
        status = ?result.status,
        commits = result.commits_transferred,
        bytes = result.bytes_transferred,
        "pulled"
    );
    Ok(result)
}

/// An object counts as present when `dest` holds as many bytes as `source`.
///
/// Descriptors are only copied after everything they name, so a present
/// directory descriptor stands for a complete subtree.
async fn object_present(
    source: &dyn RemoteStore,
    dest: &dyn RemoteStore,
    hash: &ContentHash,
) -> SyncResult<bool> {
    let want = source.has_bytes(hash).await?;
    Ok(want > 0 && dest.has_bytes(hash).await? == want)
}

/// Whether `target` is reachable from `head` by parent links, looking at no
/// more than `limit` commits.
async fn in_history(
    source: &dyn RemoteStore,
    head: &ContentHash,
    target: &ContentHash,
    limit: Option<usize>,
) -> SyncResult<bool> {
    let mut next = Some(*head);
    let mut walked = 0usize;
    while let Some(hash) = next {
        if hash == *target {
            return Ok(true);
        }
        if limit.is_some_and(|l| walked >= l) {
            debug!(walked, "conflict walk bound reached");
            return Ok(false);
        }
        walked += 1;
        next = source.get_commit(&hash).await?.and_then(|c| c.parent_sha);
    }
    Ok(false)
}

enum Step {
    Enter(ContentHash),
    Finish { hash: ContentHash, failed_before: usize },
}

struct PullRun<'a> {
    source: &'a dyn RemoteStore,
    dest: &'a dyn RemoteStore,
    chunk_size: usize,
    seen: HashSet<ContentHash>,
    result: &'a mut PullResult,
}

impl PullRun<'_> {
    /// Copy a directory tree bottom-up: file bytes and subdirectories first,
    /// then the descriptor that names them.
    async fn pull_directory(&mut self, root: ContentHash) -> SyncResult<()> {
        let mut stack = vec![Step::Enter(root)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(hash) => {
                    if !self.seen.insert(hash) {
                        continue;
                    }
                    if object_present(self.source, self.dest, &hash).await? {
                        debug!(%hash, "subtree already present");
                        continue;
                    }
                    let Some(dir) = self.source.get_directory_descriptor(&hash).await? else {
                        warn!(%hash, "directory descriptor missing at source");
                        self.result.failed += 1;
                        continue;
                    };
                    stack.push(Step::Finish {
                        hash,
                        failed_before: self.result.failed,
                    });
                    for entry in &dir.files {
                        match entry.content_sha {
                            None => {
                                debug!(name = %entry.name, "skipping entry without hash");
                                self.result.malformed_entries += 1;
                            }
                            Some(sub) if entry.is_directory => stack.push(Step::Enter(sub)),
                            Some(sha) => {
                                if self.seen.insert(sha) {
                                    self.transfer(&sha).await?;
                                }
                            }
                        }
                    }
                }
                Step::Finish { hash, failed_before } => {
                    if self.result.failed > failed_before {
                        warn!(%hash, "children incomplete, descriptor not copied");
                        continue;
                    }
                    self.transfer(&hash).await?;
                }
            }
        }
        Ok(())
    }

    async fn transfer(&mut self, hash: &ContentHash) -> SyncResult<bool> {
        let outcome = transfer_bytes(self.source, self.dest, hash, self.chunk_size).await?;
        self.result.bytes_transferred += outcome.bytes();
        if !outcome.is_ok() {
            self.result.failed += 1;
        }
        Ok(outcome.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use crate::local::tests::memory_store;
    use crate::local::LocalStore;
    use bytes::Bytes;
    use hb_crypto::ContentHasher;
    use hb_store::ObjectRepositoryExt;
    use hb_types::{Commit, DirectoryDescriptor, FileDescriptor, SourceState};

    async fn put(store: &LocalStore, data: &'static [u8]) -> ContentHash {
        let hash = ContentHasher::hash(data);
        store.put_bytes(&hash, 0, Bytes::from_static(data)).await.unwrap();
        hash
    }

    /// Commit a one-file snapshot to `source` of `store`.
    async fn snapshot(store: &LocalStore, source: &str, name: &str, data: &'static [u8]) -> ContentHash {
        let sha = put(store, data).await;
        let tx = store.start_or_continue_transaction(source).await.unwrap();
        let entry = FileDescriptor::file(name, data.len() as u64, 0, sha);
        assert!(store.push_file_descriptor(source, &tx, entry).await.unwrap());
        store.commit_transaction(source, &tx).await.unwrap().unwrap()
    }

    fn opts() -> PullOptions {
        PullOptions {
            chunk_size: 4,
            ..PullOptions::default()
        }
    }

    #[tokio::test]
    async fn pull_into_empty_destination() {
        let (src, dst) = (memory_store(), memory_store());
        let head = snapshot(&src, "s", "a.txt", b"alpha").await;

        let result = pull(&src, &dst, "s", &opts()).await.unwrap();
        assert_eq!(result.status, PullStatus::Created);
        assert_eq!(result.commits_transferred, 1);
        assert!(result.pointer_updated);
        assert_eq!(dst.get_source_state("s").await.unwrap().current_commit_sha, Some(head));

        let again = pull(&src, &dst, "s", &opts()).await.unwrap();
        assert_eq!(again.status, PullStatus::UpToDate);
        assert_eq!(again.bytes_transferred, 0);
    }

    #[tokio::test]
    async fn fast_forward_copies_only_new_commits() {
        let (src, dst) = (memory_store(), memory_store());
        snapshot(&src, "s", "a.txt", b"one").await;
        pull(&src, &dst, "s", &opts()).await.unwrap();

        let second = snapshot(&src, "s", "a.txt", b"two").await;
        let third = snapshot(&src, "s", "a.txt", b"three").await;
        let result = pull(&src, &dst, "s", &opts()).await.unwrap();
        assert_eq!(result.status, PullStatus::FastForward);
        assert_eq!(result.commits_transferred, 2);

        let copied = dst.get_commit(&third).await.unwrap().unwrap();
        assert_eq!(copied.parent_sha, Some(second));
        assert_eq!(dst.get_source_state("s").await.unwrap().current_commit_sha, Some(third));
    }

    #[tokio::test]
    async fn divergent_destination_needs_force() {
        let (src, dst) = (memory_store(), memory_store());
        let head = snapshot(&src, "s", "a.txt", b"source side").await;
        let theirs = snapshot(&dst, "s", "b.txt", b"dest side").await;

        let err = pull(&src, &dst, "s", &opts()).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFastForward { dest_commit, .. } if dest_commit == theirs));
        assert_eq!(dst.get_source_state("s").await.unwrap().current_commit_sha, Some(theirs));

        let forced = pull(&src, &dst, "s", &opts().forced(true)).await.unwrap();
        assert_eq!(forced.status, PullStatus::Forced);
        assert_eq!(dst.get_source_state("s").await.unwrap().current_commit_sha, Some(head));
    }

    #[tokio::test]
    async fn conflict_walk_respects_bound() {
        let (src, dst) = (memory_store(), memory_store());
        snapshot(&src, "s", "f", b"1").await;
        pull(&src, &dst, "s", &opts()).await.unwrap();
        snapshot(&src, "s", "f", b"2").await;
        snapshot(&src, "s", "f", b"3").await;

        let bounded = PullOptions {
            max_conflict_depth: Some(1),
            ..opts()
        };
        assert!(matches!(
            pull(&src, &dst, "s", &bounded).await,
            Err(SyncError::NotFastForward { .. })
        ));
        let result = pull(&src, &dst, "s", &opts()).await.unwrap();
        assert_eq!(result.status, PullStatus::FastForward);
    }

    #[tokio::test]
    async fn read_only_destination_keeps_pointer() {
        let (src, dst) = (memory_store(), memory_store());
        let head = snapshot(&src, "s", "a.txt", b"payload").await;
        dst.set_source_tag("s", tags::READONLY, true).await.unwrap();

        let result = pull(&src, &dst, "s", &opts()).await.unwrap();
        assert_eq!(result.commits_transferred, 1);
        assert!(!result.pointer_updated);
        assert_eq!(dst.get_source_state("s").await.unwrap().current_commit_sha, None);
        assert!(dst.get_commit(&head).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn nested_tree_and_malformed_entries() {
        let (src, dst) = (memory_store(), memory_store());
        let leaf = put(&src, b"leaf").await;
        let sub = DirectoryDescriptor::new(vec![
            FileDescriptor::file("leaf.txt", 4, 0, leaf),
            FileDescriptor {
                content_sha: None,
                ..FileDescriptor::file("legacy", 0, 0, ContentHash::EMPTY)
            },
        ]);
        let sub_hash = src.store().objects().store_object(&sub).unwrap();
        let root_dir = DirectoryDescriptor::new(vec![FileDescriptor::directory("sub", 0, sub_hash)]);
        let root_hash = src.store().objects().store_object(&root_dir).unwrap();
        let head = src.register_new_commit("s", &root_hash).await.unwrap().unwrap();

        let result = pull(&src, &dst, "s", &opts()).await.unwrap();
        assert_eq!(result.malformed_entries, 1);
        assert_eq!(result.failed, 0);
        assert_eq!(dst.get_source_state("s").await.unwrap().current_commit_sha, Some(head));
        assert!(dst.get_directory_descriptor(&sub_hash).await.unwrap().is_some());
        assert!(dst.validate_bytes(&leaf).await.unwrap());
    }

    /// Destination wrapper recording every `has_bytes` query.
    struct Recording {
        inner: LocalStore,
        queried: Mutex<Vec<ContentHash>>,
    }

    #[async_trait]
    impl RemoteStore for Recording {
        async fn get_sources(&self) -> SyncResult<Vec<String>> {
            self.inner.get_sources().await
        }
        async fn get_source_state(&self, source: &str) -> SyncResult<SourceState> {
            self.inner.get_source_state(source).await
        }
        async fn get_commit(&self, hash: &ContentHash) -> SyncResult<Option<Commit>> {
            self.inner.get_commit(hash).await
        }
        async fn get_directory_descriptor(&self, hash: &ContentHash) -> SyncResult<Option<DirectoryDescriptor>> {
            self.inner.get_directory_descriptor(hash).await
        }
        async fn has_bytes(&self, hash: &ContentHash) -> SyncResult<u64> {
            self.queried.lock().unwrap().push(*hash);
            self.inner.has_bytes(hash).await
        }
        async fn put_bytes(&self, hash: &ContentHash, offset: u64, data: Bytes) -> SyncResult<u64> {
            self.inner.put_bytes(hash, offset, data).await
        }
        async fn validate_bytes(&self, hash: &ContentHash) -> SyncResult<bool> {
            self.inner.validate_bytes(hash).await
        }
        async fn read_bytes(&self, hash: &ContentHash, offset: u64, length: u64) -> SyncResult<Option<Bytes>> {
            self.inner.read_bytes(hash, offset, length).await
        }
        async fn start_or_continue_transaction(&self, source: &str) -> SyncResult<String> {
            self.inner.start_or_continue_transaction(source).await
        }
        async fn push_file_descriptor(&self, source: &str, tx: &str, descriptor: FileDescriptor) -> SyncResult<bool> {
            self.inner.push_file_descriptor(source, tx, descriptor).await
        }
        async fn commit_transaction(&self, source: &str, tx: &str) -> SyncResult<Option<ContentHash>> {
            self.inner.commit_transaction(source, tx).await
        }
        async fn register_new_commit(&self, source: &str, dir_hash: &ContentHash) -> SyncResult<Option<ContentHash>> {
            self.inner.register_new_commit(source, dir_hash).await
        }
        async fn set_source_commit(&self, source: &str, commit: &ContentHash) -> SyncResult<bool> {
            self.inner.set_source_commit(source, commit).await
        }
        async fn set_source_tag(&self, source: &str, tag: &str, value: bool) -> SyncResult<()> {
            self.inner.set_source_tag(source, tag, value).await
        }
        async fn merge_directory(
            &self,
            source: &str,
            path: &str,
            dir_hash: &ContentHash,
            recursive: bool,
        ) -> SyncResult<ContentHash> {
            self.inner.merge_directory(source, path, dir_hash, recursive).await
        }
        async fn get_uuid(&self) -> SyncResult<String> {
            self.inner.get_uuid().await
        }
    }

    #[tokio::test]
    async fn unchanged_subtree_is_not_walked_again() {
        let src = memory_store();
        let mut files = Vec::new();
        for i in 0..50 {
            let data = format!("file number {i}").into_bytes();
            let sha = ContentHasher::hash(&data);
            let len = data.len() as u64;
            src.put_bytes(&sha, 0, Bytes::from(data)).await.unwrap();
            files.push(FileDescriptor::file(format!("f{i:02}"), len, 0, sha));
        }
        let file_hashes: HashSet<ContentHash> = files.iter().filter_map(|f| f.content_sha).collect();
        let sub_hash = src
            .store()
            .objects()
            .store_object(&DirectoryDescriptor::new(files))
            .unwrap();

        let commit_with_top = |top: ContentHash| {
            let root = DirectoryDescriptor::new(vec![
                FileDescriptor::directory("sub", 0, sub_hash),
                FileDescriptor::file("top.txt", 3, 0, top),
            ]);
            src.store().objects().store_object(&root).unwrap()
        };
        let first_top = put(&src, b"one").await;
        let first_root = commit_with_top(first_top);
        src.register_new_commit("s", &first_root).await.unwrap().unwrap();

        let dst = Recording {
            inner: memory_store(),
            queried: Mutex::new(Vec::new()),
        };
        pull(&src, &dst, "s", &opts()).await.unwrap();
        assert!(dst.inner.validate_bytes(&sub_hash).await.unwrap());

        let second_top = put(&src, b"two").await;
        let second_root = commit_with_top(second_top);
        let head = src.register_new_commit("s", &second_root).await.unwrap().unwrap();
        dst.queried.lock().unwrap().clear();

        let result = pull(&src, &dst, "s", &opts()).await.unwrap();
        assert_eq!(result.status, PullStatus::FastForward);
        assert_eq!(result.commits_transferred, 1);
        assert_eq!(dst.get_source_state("s").await.unwrap().current_commit_sha, Some(head));

        let queried = dst.queried.lock().unwrap();
        assert!(queried.iter().all(|h| !file_hashes.contains(h)));
        assert!(queried.len() < 12, "queried {} hashes", queried.len());
    }
}
