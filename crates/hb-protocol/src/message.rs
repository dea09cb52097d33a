use bytes::Bytes;
use hb_types::{Commit, ContentHash, DirectoryDescriptor, FileDescriptor, SourceState};
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// All message types in the hashback protocol.
///
/// `HasBytes` and `PushBytes` duplicate the corresponding [`StoreRequest`]
/// variants as dedicated frames; they dominate transfer traffic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum HbMessage {
    Hello { version: u32 },
    HelloAck { version: u32, uuid: String },
    Call { id: u64, request: StoreRequest },
    HasBytes { id: u64, hash: ContentHash },
    PushBytes { id: u64, hash: ContentHash, offset: u64, data: Bytes },
    Reply { id: u64, response: StoreResponse },
    Error { id: u64, code: u32, message: String },
}

impl HbMessage {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Hello { .. } => 1,
            Self::HelloAck { .. } => 2,
            Self::Call { .. } => 3,
            Self::HasBytes { .. } => 4,
            Self::PushBytes { .. } => 5,
            Self::Reply { .. } => 6,
            Self::Error { .. } => 255,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "Hello",
            Self::HelloAck { .. } => "HelloAck",
            Self::Call { .. } => "Call",
            Self::HasBytes { .. } => "HasBytes",
            Self::PushBytes { .. } => "PushBytes",
            Self::Reply { .. } => "Reply",
            Self::Error { .. } => "Error",
        }
    }

    /// Request id for call, reply and error frames.
    pub fn id(&self) -> Option<u64> {
        match self {
            Self::Call { id, .. }
            | Self::HasBytes { id, .. }
            | Self::PushBytes { id, .. }
            | Self::Reply { id, .. }
            | Self::Error { id, .. } => Some(*id),
            Self::Hello { .. } | Self::HelloAck { .. } => None,
        }
    }
}

/// One store operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StoreRequest {
    GetSources,
    GetSourceState { source: String },
    GetCommit { hash: ContentHash },
    GetDirectoryDescriptor { hash: ContentHash },
    HasBytes { hash: ContentHash },
    PutBytes { hash: ContentHash, offset: u64, data: Bytes },
    ValidateBytes { hash: ContentHash },
    ReadBytes { hash: ContentHash, offset: u64, length: u64 },
    StartOrContinueTransaction { source: String },
    PushFileDescriptor { source: String, tx: String, descriptor: FileDescriptor },
    CommitTransaction { source: String, tx: String },
    RegisterNewCommit { source: String, dir_hash: ContentHash },
    SetSourceCommit { source: String, commit: ContentHash },
    SetSourceTag { source: String, tag: String, value: bool },
    MergeDirectory { source: String, path: String, dir_hash: ContentHash, recursive: bool },
    GetUuid,
}

impl StoreRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetSources => "get_sources",
            Self::GetSourceState { .. } => "get_source_state",
            Self::GetCommit { .. } => "get_commit",
            Self::GetDirectoryDescriptor { .. } => "get_directory_descriptor",
            Self::HasBytes { .. } => "has_bytes",
            Self::PutBytes { .. } => "put_bytes",
            Self::ValidateBytes { .. } => "validate_bytes",
            Self::ReadBytes { .. } => "read_bytes",
            Self::StartOrContinueTransaction { .. } => "start_or_continue_transaction",
            Self::PushFileDescriptor { .. } => "push_file_descriptor",
            Self::CommitTransaction { .. } => "commit_transaction",
            Self::RegisterNewCommit { .. } => "register_new_commit",
            Self::SetSourceCommit { .. } => "set_source_commit",
            Self::SetSourceTag { .. } => "set_source_tag",
            Self::MergeDirectory { .. } => "merge_directory",
            Self::GetUuid => "get_uuid",
        }
    }
}

/// Result of one store operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StoreResponse {
    Sources(Vec<String>),
    SourceState(SourceState),
    Commit(Option<Commit>),
    DirectoryDescriptor(Option<DirectoryDescriptor>),
    Length(u64),
    Written(u64),
    Valid(bool),
    Bytes(Option<Bytes>),
    Transaction(String),
    Accepted(bool),
    CommitHash(Option<ContentHash>),
    Merged(ContentHash),
    Done,
    Uuid(String),
}

impl StoreResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sources(_) => "Sources",
            Self::SourceState(_) => "SourceState",
            Self::Commit(_) => "Commit",
            Self::DirectoryDescriptor(_) => "DirectoryDescriptor",
            Self::Length(_) => "Length",
            Self::Written(_) => "Written",
            Self::Valid(_) => "Valid",
            Self::Bytes(_) => "Bytes",
            Self::Transaction(_) => "Transaction",
            Self::Accepted(_) => "Accepted",
            Self::CommitHash(_) => "CommitHash",
            Self::Merged(_) => "Merged",
            Self::Done => "Done",
            Self::Uuid(_) => "Uuid",
        }
    }
}

/// Codes carried by [`HbMessage::Error`].
pub mod error_codes {
    pub const BAD_REQUEST: u32 = 400;
    pub const NOT_FOUND: u32 = 404;
    pub const CONFLICT: u32 = 409;
    pub const INTERNAL: u32 = 500;
}
