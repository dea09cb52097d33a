use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for push and pull.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Largest byte range sent in one `put_bytes` call.
    pub chunk_size: usize,
    /// Capacity of each bounded channel between push stages. A producer
    /// waits once its channel holds this many items.
    pub queue_capacity: usize,
    /// Number of recently sent hashes remembered for deduplication. The set
    /// is cleared once it reaches this size.
    pub dedup_capacity: usize,
    /// Interval of the push throughput report, in milliseconds. 0 disables it.
    pub progress_interval_ms: u64,
    /// How many source commits a pull inspects before declaring a conflict.
    /// `None` walks the whole chain.
    pub max_conflict_depth: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            queue_capacity: 64,
            dedup_capacity: 100_000,
            progress_interval_ms: 5_000,
            max_conflict_depth: None,
        }
    }
}

impl SyncConfig {
    pub fn progress_interval(&self) -> Option<Duration> {
        (self.progress_interval_ms > 0).then(|| Duration::from_millis(self.progress_interval_ms))
    }
}
