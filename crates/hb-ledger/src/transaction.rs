//! Transaction and commit operations of [`SourceStore`].

use chrono::Utc;
use hb_store::ObjectRepositoryExt;
use hb_types::{Commit, ContentHash, DirectoryDescriptor, FileDescriptor, SourceState};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::store::SourceStore;

impl SourceStore {
    /// Return the open transaction of `source`, opening one if needed.
    pub fn start_or_continue_transaction(&self, source: &str) -> LedgerResult<String> {
        let mut states = self.lock_states()?;
        let cached = self.cached(&mut states, source)?;
        if let Some(tx) = &cached.state.current_transaction_id {
            debug!(%source, %tx, "continuing transaction");
            return Ok(tx.clone());
        }
        let tx = Uuid::now_v7().to_string();
        cached.state.open_transaction(tx.clone());
        self.persist(cached)?;
        info!(%source, %tx, "opened transaction");
        Ok(tx)
    }

    /// Add a top-level entry to the open transaction of `source`.
    ///
    /// Returns `false` when `tx` is not the open transaction, or when a file
    /// entry's bytes are not present and valid. Directory entries are taken
    /// as they come. Pushing an entry identical to the recorded one changes
    /// nothing.
    pub fn push_file_descriptor(
        &self,
        source: &str,
        tx: &str,
        descriptor: FileDescriptor,
    ) -> LedgerResult<bool> {
        if !self.is_open_transaction(source, tx)? {
            warn!(%source, %tx, name = %descriptor.name, "rejected entry for foreign transaction");
            return Ok(false);
        }

        if !descriptor.is_directory {
            let Some(sha) = descriptor.content_sha else {
                warn!(%source, name = %descriptor.name, "rejected file entry without hash");
                return Ok(false);
            };
            if !self.objects().validate_bytes(&sha)? {
                warn!(%source, name = %descriptor.name, hash = %sha, "rejected file entry with invalid bytes");
                return Ok(false);
            }
        }

        let mut states = self.lock_states()?;
        let cached = self.cached(&mut states, source)?;
        // The transaction may have been committed while validating.
        if !cached.state.is_current_transaction(tx) {
            warn!(%source, %tx, "transaction closed during push");
            return Ok(false);
        }
        let content = cached
            .state
            .current_transaction_content
            .get_or_insert_with(Default::default);
        if content.get(&descriptor.name) == Some(&descriptor) {
            return Ok(true);
        }
        content.insert(descriptor.name.clone(), descriptor);
        self.touch(cached)?;
        Ok(true)
    }

    /// Close the transaction, storing its descriptor and a new commit.
    ///
    /// Returns the new commit hash, or `None` when the snapshot equals the
    /// current commit's tree and no commit was created.
    pub fn commit_transaction(&self, source: &str, tx: &str) -> LedgerResult<Option<ContentHash>> {
        let mut states = self.lock_states()?;
        let cached = self.cached(&mut states, source)?;
        if !cached.state.is_current_transaction(tx) {
            return Err(LedgerError::TransactionMismatch {
                source_id: source.to_string(),
                expected: cached.state.current_transaction_id.clone(),
                actual: tx.to_string(),
            });
        }

        // The transaction stays open until its descriptor and commit are stored.
        let entries = cached
            .state
            .current_transaction_content
            .as_ref()
            .map(|content| content.values().cloned().collect())
            .unwrap_or_default();
        let descriptor = DirectoryDescriptor::new(entries);
        let dir_sha = self.objects().store_object(&descriptor)?;
        let commit = self.advance(&mut cached.state, dir_sha)?;
        cached.state.close_transaction();
        self.persist(cached)?;

        match commit {
            Some(c) => info!(%source, commit = %c.short_hex(), entries = descriptor.len(), "committed"),
            None => info!(%source, "snapshot unchanged, no commit"),
        }
        Ok(commit)
    }

    /// Chain a commit of an already stored root descriptor onto `source`.
    pub fn register_new_commit(
        &self,
        source: &str,
        dir_sha: &ContentHash,
    ) -> LedgerResult<Option<ContentHash>> {
        if self.get_directory_descriptor(dir_sha).is_none() {
            return Err(LedgerError::DescriptorNotFound(*dir_sha));
        }
        let mut states = self.lock_states()?;
        let cached = self.cached(&mut states, source)?;
        let commit = self.advance(&mut cached.state, *dir_sha)?;
        if commit.is_some() {
            self.persist(cached)?;
        }
        Ok(commit)
    }

    fn is_open_transaction(&self, source: &str, tx: &str) -> LedgerResult<bool> {
        let mut states = self.lock_states()?;
        Ok(self.cached(&mut states, source)?.state.is_current_transaction(tx))
    }

    /// Store a commit of `dir_sha` on top of the current one, unless the
    /// current commit already points at the same tree.
    fn advance(
        &self,
        state: &mut SourceState,
        dir_sha: ContentHash,
    ) -> LedgerResult<Option<ContentHash>> {
        if let Some(current) = state.current_commit_sha {
            match self.get_commit(&current) {
                Some(c) if c.directory_descriptor_sha == dir_sha => return Ok(None),
                Some(_) => {}
                None => warn!(source = %state.id, commit = %current, "current commit unreadable, chaining anyway"),
            }
        }
        let commit = Commit::new(state.current_commit_sha, dir_sha, Utc::now().timestamp_millis());
        let hash = self.objects().store_object(&commit)?;
        state.current_commit_sha = Some(hash);
        Ok(Some(hash))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Read};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use crate::config::{FlushPolicy, LedgerConfig};
    use crate::error::LedgerError;
    use crate::store::tests::memory_store;
    use crate::SourceStore;
    use hb_crypto::ContentHasher;
    use hb_refs::{InMemoryRefStore, ReferenceRepositoryExt};
    use hb_store::{
        InMemoryObjectRepository, ObjectRepository, ObjectRepositoryExt, StoreError, StoreResult,
    };
    use hb_types::{ContentHash, DirectoryDescriptor, FileDescriptor, SourceState};

    fn put_blob(store: &SourceStore, data: &[u8]) -> ContentHash {
        let hash = ContentHasher::hash(data);
        store.objects().put_bytes(&hash, 0, data).unwrap();
        hash
    }

    #[test]
    fn transaction_is_reused_until_committed() {
        let (store, _) = memory_store(FlushPolicy::Immediate);
        let tx1 = store.start_or_continue_transaction("s").unwrap();
        let tx2 = store.start_or_continue_transaction("s").unwrap();
        assert_eq!(tx1, tx2);
        store.commit_transaction("s", &tx1).unwrap();
        let tx3 = store.start_or_continue_transaction("s").unwrap();
        assert_ne!(tx1, tx3);
    }

    #[test]
    fn foreign_transaction_is_rejected() {
        let (store, _) = memory_store(FlushPolicy::Immediate);
        store.start_or_continue_transaction("s").unwrap();
        let dir = FileDescriptor::directory("d", 0, ContentHasher::hash(b"x"));
        assert!(!store.push_file_descriptor("s", "stale", dir).unwrap());
        assert!(matches!(
            store.commit_transaction("s", "stale"),
            Err(LedgerError::TransactionMismatch { .. })
        ));
    }

    #[test]
    fn file_needs_valid_bytes() {
        let (store, _) = memory_store(FlushPolicy::Immediate);
        let tx = store.start_or_continue_transaction("s").unwrap();
        let missing = FileDescriptor::file("a", 5, 0, ContentHasher::hash(b"hello"));
        assert!(!store.push_file_descriptor("s", &tx, missing.clone()).unwrap());

        put_blob(&store, b"hello");
        assert!(store.push_file_descriptor("s", &tx, missing).unwrap());
    }

    #[test]
    fn identical_push_is_noop() {
        let (store, refs) = memory_store(FlushPolicy::Debounced { interval_ms: 60_000 });
        let tx = store.start_or_continue_transaction("s").unwrap();
        let sha = put_blob(&store, b"hello");
        let fd = FileDescriptor::file("a", 5, 0, sha);
        assert!(store.push_file_descriptor("s", &tx, fd.clone()).unwrap());
        assert!(store.push_file_descriptor("s", &tx, fd).unwrap());

        let state = store.get_source_state("s").unwrap();
        assert_eq!(state.current_transaction_content.unwrap().len(), 1);

        // Content updates wait for the debounce window or an explicit flush.
        let persisted: SourceState = refs.get_typed("source-s").unwrap().unwrap();
        assert!(persisted.current_transaction_content.unwrap().is_empty());
        store.flush().unwrap();
        let persisted: SourceState = refs.get_typed("source-s").unwrap().unwrap();
        assert_eq!(persisted.current_transaction_content.unwrap().len(), 1);
    }

    #[test]
    fn commit_chains_and_dedups() {
        let (store, _) = memory_store(FlushPolicy::Immediate);
        let sha = put_blob(&store, b"hello");

        let tx = store.start_or_continue_transaction("s").unwrap();
        store
            .push_file_descriptor("s", &tx, FileDescriptor::file("a", 5, 0, sha))
            .unwrap();
        let first = store.commit_transaction("s", &tx).unwrap().unwrap();
        let commit = store.get_commit(&first).unwrap();
        assert!(commit.parent_sha.is_none());

        // Same content again: no new commit.
        let tx = store.start_or_continue_transaction("s").unwrap();
        store
            .push_file_descriptor("s", &tx, FileDescriptor::file("a", 5, 0, sha))
            .unwrap();
        assert!(store.commit_transaction("s", &tx).unwrap().is_none());
        assert_eq!(store.get_source_state("s").unwrap().current_commit_sha, Some(first));

        // Different content chains onto the first commit.
        let other = put_blob(&store, b"world");
        let tx = store.start_or_continue_transaction("s").unwrap();
        store
            .push_file_descriptor("s", &tx, FileDescriptor::file("a", 5, 1, other))
            .unwrap();
        let second = store.commit_transaction("s", &tx).unwrap().unwrap();
        assert_eq!(store.get_commit(&second).unwrap().parent_sha, Some(first));

        let history = store.history("s", None).unwrap();
        assert_eq!(history.iter().map(|(h, _)| *h).collect::<Vec<_>>(), vec![second, first]);
        assert_eq!(store.history("s", Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn committed_descriptor_is_readable() {
        let (store, _) = memory_store(FlushPolicy::Immediate);
        let sha = put_blob(&store, b"hello");
        let tx = store.start_or_continue_transaction("s").unwrap();
        store
            .push_file_descriptor("s", &tx, FileDescriptor::file("a.txt", 5, 0, sha))
            .unwrap();
        let commit = store.commit_transaction("s", &tx).unwrap().unwrap();
        let dir_sha = store.get_commit(&commit).unwrap().directory_descriptor_sha;
        let dir = store.get_directory_descriptor(&dir_sha).unwrap();
        assert_eq!(dir.get("a.txt").unwrap().content_sha, Some(sha));
        assert!(!store.get_source_state("s").unwrap().has_open_transaction());
    }

    #[test]
    fn register_requires_stored_descriptor() {
        let (store, _) = memory_store(FlushPolicy::Immediate);
        let bogus = ContentHasher::hash(b"nope");
        assert!(matches!(
            store.register_new_commit("s", &bogus),
            Err(LedgerError::DescriptorNotFound(_))
        ));

        let dir_sha = store.objects().store_object(&DirectoryDescriptor::empty()).unwrap();
        let c = store.register_new_commit("s", &dir_sha).unwrap();
        assert!(c.is_some());
        assert!(store.register_new_commit("s", &dir_sha).unwrap().is_none());
    }

    /// Object repository whose writes can be switched off.
    struct FlakyObjects {
        inner: InMemoryObjectRepository,
        refuse_writes: AtomicBool,
    }

    impl ObjectRepository for FlakyObjects {
        fn has_bytes(&self, hash: &ContentHash) -> StoreResult<u64> {
            self.inner.has_bytes(hash)
        }

        fn put_bytes(&self, hash: &ContentHash, offset: u64, data: &[u8]) -> StoreResult<u64> {
            if self.refuse_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Io(io::Error::other("disk full")));
            }
            self.inner.put_bytes(hash, offset, data)
        }

        fn validate_bytes(&self, hash: &ContentHash) -> StoreResult<bool> {
            self.inner.validate_bytes(hash)
        }

        fn close_handle(&self, hash: &ContentHash) -> StoreResult<()> {
            self.inner.close_handle(hash)
        }

        fn read_bytes(
            &self,
            hash: &ContentHash,
            offset: u64,
            length: u64,
        ) -> StoreResult<Option<Vec<u8>>> {
            self.inner.read_bytes(hash, offset, length)
        }

        fn read_as_stream(
            &self,
            hash: &ContentHash,
            start: u64,
            end: Option<u64>,
        ) -> StoreResult<Option<Box<dyn Read + Send>>> {
            self.inner.read_as_stream(hash, start, end)
        }
    }

    #[test]
    fn failed_commit_keeps_transaction() {
        let objects = Arc::new(FlakyObjects {
            inner: InMemoryObjectRepository::new(),
            refuse_writes: AtomicBool::new(false),
        });
        let store = SourceStore::new(
            objects.clone(),
            Arc::new(InMemoryRefStore::new()),
            LedgerConfig::default(),
        )
        .unwrap();
        let sha = put_blob(&store, b"hello");
        let tx = store.start_or_continue_transaction("s").unwrap();
        assert!(store
            .push_file_descriptor("s", &tx, FileDescriptor::file("a", 5, 0, sha))
            .unwrap());

        objects.refuse_writes.store(true, Ordering::SeqCst);
        assert!(matches!(
            store.commit_transaction("s", &tx),
            Err(LedgerError::Store(_))
        ));
        let state = store.get_source_state("s").unwrap();
        assert_eq!(state.current_transaction_id.as_deref(), Some(tx.as_str()));
        assert_eq!(state.current_transaction_content.unwrap().len(), 1);
        assert!(state.current_commit_sha.is_none());

        objects.refuse_writes.store(false, Ordering::SeqCst);
        let commit = store.commit_transaction("s", &tx).unwrap().unwrap();
        let dir_sha = store.get_commit(&commit).unwrap().directory_descriptor_sha;
        assert!(store.get_directory_descriptor(&dir_sha).unwrap().get("a").is_some());
        assert!(!store.get_source_state("s").unwrap().has_open_transaction());
    }
}
