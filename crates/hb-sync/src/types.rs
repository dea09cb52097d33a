use hb_types::ContentHash;
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PullOptions {
    /// Overwrite a destination whose commit is not in the source history.
    pub force: bool,
    pub chunk_size: usize,
    pub max_conflict_depth: Option<usize>,
}

impl Default for PullOptions {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for PullOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            force: false,
            chunk_size: config.chunk_size,
            max_conflict_depth: config.max_conflict_depth,
        }
    }
}

impl PullOptions {
    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// How the destination pointer relates to the source after a pull.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullStatus {
    #[default]
    UpToDate,
    FastForward,
    Forced,
    Created,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PullResult {
    pub status: PullStatus,
    pub commits_transferred: usize,
    pub bytes_transferred: u64,
    /// Descriptor entries without a content hash, skipped.
    pub malformed_entries: usize,
    /// Hashes that could not be transferred or validated.
    pub failed: usize,
    /// Whether the destination pointer now matches the source.
    pub pointer_updated: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushResult {
    pub root_hash: ContentHash,
    /// The new commit, or `None` if nothing changed or something failed.
    pub commit: Option<ContentHash>,
    pub files: usize,
    pub directories: usize,
    pub hashes_transferred: usize,
    pub bytes_transferred: u64,
    pub failed: usize,
}
