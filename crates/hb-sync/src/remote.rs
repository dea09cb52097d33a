use async_trait::async_trait;
use bytes::Bytes;
use hb_types::{Commit, ContentHash, DirectoryDescriptor, FileDescriptor, SourceState};

use crate::error::SyncResult;

/// The store interface shared by local and remote stores.
///
/// Protocol-level refusals (a foreign transaction, a missing commit or
/// descriptor) come back as `None` or `false`; errors are reserved for
/// I/O and transport failures.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get_sources(&self) -> SyncResult<Vec<String>>;
    async fn get_source_state(&self, source: &str) -> SyncResult<SourceState>;
    async fn get_commit(&self, hash: &ContentHash) -> SyncResult<Option<Commit>>;
    async fn get_directory_descriptor(&self, hash: &ContentHash) -> SyncResult<Option<DirectoryDescriptor>>;

    /// Bytes currently stored for `hash`, validated or not.
    async fn has_bytes(&self, hash: &ContentHash) -> SyncResult<u64>;
    async fn put_bytes(&self, hash: &ContentHash, offset: u64, data: Bytes) -> SyncResult<u64>;
    async fn validate_bytes(&self, hash: &ContentHash) -> SyncResult<bool>;
    async fn read_bytes(&self, hash: &ContentHash, offset: u64, length: u64) -> SyncResult<Option<Bytes>>;

    async fn start_or_continue_transaction(&self, source: &str) -> SyncResult<String>;
    async fn push_file_descriptor(&self, source: &str, tx: &str, descriptor: FileDescriptor) -> SyncResult<bool>;
    async fn commit_transaction(&self, source: &str, tx: &str) -> SyncResult<Option<ContentHash>>;
    async fn register_new_commit(&self, source: &str, dir_hash: &ContentHash) -> SyncResult<Option<ContentHash>>;

    /// Point `source` at `commit`. Returns `false` if the commit is unknown.
    async fn set_source_commit(&self, source: &str, commit: &ContentHash) -> SyncResult<bool>;
    async fn set_source_tag(&self, source: &str, tag: &str, value: bool) -> SyncResult<()>;

    /// Merge a stored directory into `path` of `source` and commit.
    async fn merge_directory(
        &self,
        source: &str,
        path: &str,
        dir_hash: &ContentHash,
        recursive: bool,
    ) -> SyncResult<ContentHash>;

    async fn get_uuid(&self) -> SyncResult<String>;
}
