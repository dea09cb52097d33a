use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use hb_protocol::{
    read_message, write_message, HbMessage, ProtocolError, StoreRequest, StoreResponse,
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};
use hb_types::{Commit, ContentHash, DirectoryDescriptor, FileDescriptor, SourceState};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStore;

/// Unwrap one expected [`StoreResponse`] variant.
macro_rules! expect_response {
    ($response:expr, $variant:ident) => {
        match $response {
            StoreResponse::$variant(value) => Ok(value),
            other => Err(SyncError::UnexpectedResponse {
                expected: stringify!($variant),
                actual: other.kind(),
            }),
        }
    };
}

/// [`RemoteStore`] client speaking the framed protocol over TCP.
///
/// Calls are strictly request/response on one connection; concurrent
/// callers queue on the stream lock.
pub struct TcpRemote {
    address: String,
    stream: Mutex<TcpStream>,
    next_id: AtomicU64,
    max_frame: usize,
    uuid: String,
}

impl std::fmt::Debug for TcpRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpRemote")
            .field("address", &self.address)
            .field("uuid", &self.uuid)
            .finish()
    }
}

impl TcpRemote {
    pub async fn connect(address: &str) -> SyncResult<Self> {
        Self::connect_with_limit(address, MAX_MESSAGE_SIZE).await
    }

    /// Connect and perform the `Hello` handshake.
    pub async fn connect_with_limit(address: &str, max_frame: usize) -> SyncResult<Self> {
        let mut stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        write_message(
            &mut stream,
            &HbMessage::Hello {
                version: PROTOCOL_VERSION,
            },
            max_frame,
        )
        .await?;
        let uuid = match read_message(&mut stream, max_frame).await? {
            Some(HbMessage::HelloAck { version, uuid }) if version == PROTOCOL_VERSION => uuid,
            Some(HbMessage::HelloAck { version, .. }) => {
                return Err(ProtocolError::VersionMismatch {
                    local: PROTOCOL_VERSION,
                    remote: version,
                }
                .into())
            }
            Some(HbMessage::Error { code, message, .. }) => {
                return Err(SyncError::Remote { code, message })
            }
            Some(_) => return Err(ProtocolError::Unexpected("expected HelloAck").into()),
            None => {
                return Err(SyncError::TransportError(
                    "connection closed during handshake".into(),
                ))
            }
        };
        info!(%address, remote = %uuid, "connected");
        Ok(Self {
            address: address.to_string(),
            stream: Mutex::new(stream),
            next_id: AtomicU64::new(1),
            max_frame,
            uuid,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// UUID announced by the server during the handshake.
    pub fn remote_uuid(&self) -> &str {
        &self.uuid
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn roundtrip(&self, id: u64, msg: HbMessage) -> SyncResult<StoreResponse> {
        let mut stream = self.stream.lock().await;
        write_message(&mut *stream, &msg, self.max_frame).await?;
        match read_message(&mut *stream, self.max_frame).await? {
            Some(HbMessage::Reply { id: got, response }) if got == id => Ok(response),
            Some(HbMessage::Error { code, message, .. }) => Err(SyncError::Remote { code, message }),
            Some(other) => {
                debug!(expected = id, got = ?other.id(), kind = other.type_name(), "stray frame");
                Err(ProtocolError::Unexpected("reply id does not match request").into())
            }
            None => Err(SyncError::TransportError(format!(
                "connection to {} closed",
                self.address
            ))),
        }
    }

    async fn call(&self, request: StoreRequest) -> SyncResult<StoreResponse> {
        let id = self.next_id();
        self.roundtrip(id, HbMessage::Call { id, request }).await
    }
}

#[async_trait]
impl RemoteStore for TcpRemote {
    async fn get_sources(&self) -> SyncResult<Vec<String>> {
        expect_response!(self.call(StoreRequest::GetSources).await?, Sources)
    }

    async fn get_source_state(&self, source: &str) -> SyncResult<SourceState> {
        let request = StoreRequest::GetSourceState {
            source: source.to_string(),
        };
        expect_response!(self.call(request).await?, SourceState)
    }

    async fn get_commit(&self, hash: &ContentHash) -> SyncResult<Option<Commit>> {
        expect_response!(self.call(StoreRequest::GetCommit { hash: *hash }).await?, Commit)
    }

    async fn get_directory_descriptor(&self, hash: &ContentHash) -> SyncResult<Option<DirectoryDescriptor>> {
        let request = StoreRequest::GetDirectoryDescriptor { hash: *hash };
        expect_response!(self.call(request).await?, DirectoryDescriptor)
    }

    async fn has_bytes(&self, hash: &ContentHash) -> SyncResult<u64> {
        let id = self.next_id();
        let response = self.roundtrip(id, HbMessage::HasBytes { id, hash: *hash }).await?;
        expect_response!(response, Length)
    }

    async fn put_bytes(&self, hash: &ContentHash, offset: u64, data: Bytes) -> SyncResult<u64> {
        let id = self.next_id();
        let msg = HbMessage::PushBytes {
            id,
            hash: *hash,
            offset,
            data,
        };
        expect_response!(self.roundtrip(id, msg).await?, Written)
    }

    async fn validate_bytes(&self, hash: &ContentHash) -> SyncResult<bool> {
        expect_response!(self.call(StoreRequest::ValidateBytes { hash: *hash }).await?, Valid)
    }

    async fn read_bytes(&self, hash: &ContentHash, offset: u64, length: u64) -> SyncResult<Option<Bytes>> {
        let request = StoreRequest::ReadBytes {
            hash: *hash,
            offset,
            length,
        };
        expect_response!(self.call(request).await?, Bytes)
    }

    async fn start_or_continue_transaction(&self, source: &str) -> SyncResult<String> {
        let request = StoreRequest::StartOrContinueTransaction {
            source: source.to_string(),
        };
        expect_response!(self.call(request).await?, Transaction)
    }

    async fn push_file_descriptor(&self, source: &str, tx: &str, descriptor: FileDescriptor) -> SyncResult<bool> {
        let request = StoreRequest::PushFileDescriptor {
            source: source.to_string(),
            tx: tx.to_string(),
            descriptor,
        };
        expect_response!(self.call(request).await?, Accepted)
    }

    async fn commit_transaction(&self, source: &str, tx: &str) -> SyncResult<Option<ContentHash>> {
        let request = StoreRequest::CommitTransaction {
            source: source.to_string(),
            tx: tx.to_string(),
        };
        expect_response!(self.call(request).await?, CommitHash)
    }

    async fn register_new_commit(&self, source: &str, dir_hash: &ContentHash) -> SyncResult<Option<ContentHash>> {
        let request = StoreRequest::RegisterNewCommit {
            source: source.to_string(),
            dir_hash: *dir_hash,
        };
        expect_response!(self.call(request).await?, CommitHash)
    }

    async fn set_source_commit(&self, source: &str, commit: &ContentHash) -> SyncResult<bool> {
        let request = StoreRequest::SetSourceCommit {
            source: source.to_string(),
            commit: *commit,
        };
        expect_response!(self.call(request).await?, Accepted)
    }

    async fn set_source_tag(&self, source: &str, tag: &str, value: bool) -> SyncResult<()> {
        let request = StoreRequest::SetSourceTag {
            source: source.to_string(),
            tag: tag.to_string(),
            value,
        };
        match self.call(request).await? {
            StoreResponse::Done => Ok(()),
            other => Err(SyncError::UnexpectedResponse {
                expected: "Done",
                actual: other.kind(),
            }),
        }
    }

    async fn merge_directory(
        &self,
        source: &str,
        path: &str,
        dir_hash: &ContentHash,
        recursive: bool,
    ) -> SyncResult<ContentHash> {
        let request = StoreRequest::MergeDirectory {
            source: source.to_string(),
            path: path.to_string(),
            dir_hash: *dir_hash,
            recursive,
        };
        expect_response!(self.call(request).await?, Merged)
    }

    async fn get_uuid(&self) -> SyncResult<String> {
        expect_response!(self.call(StoreRequest::GetUuid).await?, Uuid)
    }
}
