use std::time::Duration;

use hb_index::ShaCacheConfig;
use serde::{Deserialize, Serialize};

/// When content updates to a source state reach the reference repository.
///
/// Structural transitions (opening or committing a transaction, moving the
/// commit pointer, changing tags) are always written at once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Write after every update.
    Immediate,
    /// Write at most once per interval; the rest waits for `flush()` or drop.
    Debounced { interval_ms: u64 },
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self::Debounced { interval_ms: 2000 }
    }
}

impl FlushPolicy {
    /// Minimum time between two content flushes of one source.
    pub fn interval(&self) -> Duration {
        match self {
            Self::Immediate => Duration::ZERO,
            Self::Debounced { interval_ms } => Duration::from_millis(*interval_ms),
        }
    }
}

/// Configuration of a [`SourceStore`](crate::SourceStore).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub flush_policy: FlushPolicy,
    pub sha_cache: ShaCacheConfig,
}
