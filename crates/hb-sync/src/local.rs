use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use hb_ledger::{LedgerError, SourceStore};
use hb_types::{Commit, ContentHash, DirectoryDescriptor, FileDescriptor, SourceState};
use tracing::warn;

use crate::error::SyncResult;
use crate::remote::RemoteStore;

/// [`RemoteStore`] over a store in this process.
///
/// Every call runs on the blocking pool since the store does file I/O.
#[derive(Clone, Debug)]
pub struct LocalStore {
    store: Arc<SourceStore>,
}

impl LocalStore {
    pub fn new(store: Arc<SourceStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<SourceStore> {
        &self.store
    }

    async fn run<T, F>(&self, f: F) -> SyncResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SourceStore) -> SyncResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store)).await?
    }
}

#[async_trait]
impl RemoteStore for LocalStore {
    async fn get_sources(&self) -> SyncResult<Vec<String>> {
        self.run(|s| Ok(s.get_sources()?)).await
    }

    async fn get_source_state(&self, source: &str) -> SyncResult<SourceState> {
        let source = source.to_string();
        self.run(move |s| Ok(s.get_source_state(&source)?)).await
    }

    async fn get_commit(&self, hash: &ContentHash) -> SyncResult<Option<Commit>> {
        let hash = *hash;
        self.run(move |s| Ok(s.get_commit(&hash))).await
    }

    async fn get_directory_descriptor(&self, hash: &ContentHash) -> SyncResult<Option<DirectoryDescriptor>> {
        let hash = *hash;
        self.run(move |s| Ok(s.get_directory_descriptor(&hash))).await
    }

    async fn has_bytes(&self, hash: &ContentHash) -> SyncResult<u64> {
        let hash = *hash;
        self.run(move |s| Ok(s.objects().has_bytes(&hash)?)).await
    }

    async fn put_bytes(&self, hash: &ContentHash, offset: u64, data: Bytes) -> SyncResult<u64> {
        let hash = *hash;
        self.run(move |s| Ok(s.objects().put_bytes(&hash, offset, &data)?))
            .await
    }

    async fn validate_bytes(&self, hash: &ContentHash) -> SyncResult<bool> {
        let hash = *hash;
        self.run(move |s| Ok(s.objects().validate_bytes(&hash)?)).await
    }

    async fn read_bytes(&self, hash: &ContentHash, offset: u64, length: u64) -> SyncResult<Option<Bytes>> {
        let hash = *hash;
        self.run(move |s| {
            Ok(s.objects()
                .read_bytes(&hash, offset, length)?
                .map(Bytes::from))
        })
        .await
    }

    async fn start_or_continue_transaction(&self, source: &str) -> SyncResult<String> {
        let source = source.to_string();
        self.run(move |s| Ok(s.start_or_continue_transaction(&source)?))
            .await
    }

    async fn push_file_descriptor(&self, source: &str, tx: &str, descriptor: FileDescriptor) -> SyncResult<bool> {
        let (source, tx) = (source.to_string(), tx.to_string());
        self.run(move |s| Ok(s.push_file_descriptor(&source, &tx, descriptor)?))
            .await
    }

    async fn commit_transaction(&self, source: &str, tx: &str) -> SyncResult<Option<ContentHash>> {
        let (source, tx) = (source.to_string(), tx.to_string());
        self.run(move |s| match s.commit_transaction(&source, &tx) {
            Err(e @ LedgerError::TransactionMismatch { .. }) => {
                warn!(error = %e, "commit refused");
                Ok(None)
            }
            other => Ok(other?),
        })
        .await
    }

    async fn register_new_commit(&self, source: &str, dir_hash: &ContentHash) -> SyncResult<Option<ContentHash>> {
        let (source, dir_hash) = (source.to_string(), *dir_hash);
        self.run(move |s| match s.register_new_commit(&source, &dir_hash) {
            Err(LedgerError::DescriptorNotFound(hash)) => {
                warn!(%source, %hash, "cannot commit unknown directory descriptor");
                Ok(None)
            }
            other => Ok(other?),
        })
        .await
    }

    async fn set_source_commit(&self, source: &str, commit: &ContentHash) -> SyncResult<bool> {
        let (source, commit) = (source.to_string(), *commit);
        self.run(move |s| match s.set_source_commit(&source, &commit) {
            Ok(()) => Ok(true),
            Err(LedgerError::CommitNotFound(hash)) => {
                warn!(%source, commit = %hash, "cannot point source at unknown commit");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn set_source_tag(&self, source: &str, tag: &str, value: bool) -> SyncResult<()> {
        let (source, tag) = (source.to_string(), tag.to_string());
        self.run(move |s| Ok(s.set_source_tag(&source, &tag, value)?))
            .await
    }

    async fn merge_directory(
        &self,
        source: &str,
        path: &str,
        dir_hash: &ContentHash,
        recursive: bool,
    ) -> SyncResult<ContentHash> {
        let (source, path, dir_hash) = (source.to_string(), path.to_string(), *dir_hash);
        self.run(move |s| {
            Ok(hb_merge::commit_directory_into_path(
                s, &source, &path, &dir_hash, recursive,
            )?)
        })
        .await
    }

    async fn get_uuid(&self) -> SyncResult<String> {
        Ok(self.store.get_uuid().to_string())
    }
}
