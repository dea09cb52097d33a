use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;

/// Immutable snapshot record of one source.
///
/// Commits form a singly linked list from newest to oldest through
/// `parent_sha`. The first commit of a source has no parent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub parent_sha: Option<ContentHash>,
    /// Milliseconds since the Unix epoch.
    pub commit_date: i64,
    pub directory_descriptor_sha: ContentHash,
}

impl Commit {
    pub fn new(
        parent_sha: Option<ContentHash>,
        directory_descriptor_sha: ContentHash,
        commit_date: i64,
    ) -> Self {
        Self {
            parent_sha,
            commit_date,
            directory_descriptor_sha,
        }
    }

    /// Returns `true` for the first commit of a history.
    pub fn is_root(&self) -> bool {
        self.parent_sha.is_none()
    }
}
