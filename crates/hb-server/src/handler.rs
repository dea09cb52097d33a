use hb_merge::MergeError;
use hb_protocol::{error_codes, StoreRequest, StoreResponse};
use hb_sync::{RemoteStore, SyncError, SyncResult};

/// Run one request against `store`.
pub async fn dispatch(store: &dyn RemoteStore, request: StoreRequest) -> SyncResult<StoreResponse> {
    let response = match request {
        StoreRequest::GetSources => StoreResponse::Sources(store.get_sources().await?),
        StoreRequest::GetSourceState { source } => {
            StoreResponse::SourceState(store.get_source_state(&source).await?)
        }
        StoreRequest::GetCommit { hash } => StoreResponse::Commit(store.get_commit(&hash).await?),
        StoreRequest::GetDirectoryDescriptor { hash } => {
            StoreResponse::DirectoryDescriptor(store.get_directory_descriptor(&hash).await?)
        }
        StoreRequest::HasBytes { hash } => StoreResponse::Length(store.has_bytes(&hash).await?),
        StoreRequest::PutBytes { hash, offset, data } => {
            StoreResponse::Written(store.put_bytes(&hash, offset, data).await?)
        }
        StoreRequest::ValidateBytes { hash } => {
            StoreResponse::Valid(store.validate_bytes(&hash).await?)
        }
        StoreRequest::ReadBytes {
            hash,
            offset,
            length,
        } => StoreResponse::Bytes(store.read_bytes(&hash, offset, length).await?),
        StoreRequest::StartOrContinueTransaction { source } => {
            StoreResponse::Transaction(store.start_or_continue_transaction(&source).await?)
        }
        StoreRequest::PushFileDescriptor {
            source,
            tx,
            descriptor,
        } => StoreResponse::Accepted(store.push_file_descriptor(&source, &tx, descriptor).await?),
        StoreRequest::CommitTransaction { source, tx } => {
            StoreResponse::CommitHash(store.commit_transaction(&source, &tx).await?)
        }
        StoreRequest::RegisterNewCommit { source, dir_hash } => {
            StoreResponse::CommitHash(store.register_new_commit(&source, &dir_hash).await?)
        }
        StoreRequest::SetSourceCommit { source, commit } => {
            StoreResponse::Accepted(store.set_source_commit(&source, &commit).await?)
        }
        StoreRequest::SetSourceTag { source, tag, value } => {
            store.set_source_tag(&source, &tag, value).await?;
            StoreResponse::Done
        }
        StoreRequest::MergeDirectory {
            source,
            path,
            dir_hash,
            recursive,
        } => StoreResponse::Merged(
            store
                .merge_directory(&source, &path, &dir_hash, recursive)
                .await?,
        ),
        StoreRequest::GetUuid => StoreResponse::Uuid(store.get_uuid().await?),
    };
    Ok(response)
}

/// Wire code for a failed request.
pub fn error_code(err: &SyncError) -> u32 {
    match err {
        SyncError::Merge(MergeError::TypeConflict { .. }) | SyncError::NotFastForward { .. } => {
            error_codes::CONFLICT
        }
        SyncError::Merge(MergeError::DescriptorNotFound(_)) | SyncError::CommitNotFound(_) => {
            error_codes::NOT_FOUND
        }
        SyncError::Protocol(_) | SyncError::UnexpectedResponse { .. } => error_codes::BAD_REQUEST,
        _ => error_codes::INTERNAL,
    }
}
