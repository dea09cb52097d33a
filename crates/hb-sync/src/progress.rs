use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::info;

/// Shared push counters.
#[derive(Debug, Default)]
pub struct Progress {
    entries: AtomicU64,
    hashes: AtomicU64,
    bytes: AtomicU64,
}

impl Progress {
    pub fn entry(&self) {
        self.entries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transferred(&self, bytes: u64) {
        self.hashes.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.entries.load(Ordering::Relaxed),
            self.hashes.load(Ordering::Relaxed),
            self.bytes.load(Ordering::Relaxed),
        )
    }
}

/// Log throughput every `every` until aborted.
pub fn spawn_reporter(progress: Arc<Progress>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let (entries, hashes, bytes) = progress.snapshot();
            let secs = started.elapsed().as_secs_f64().max(0.001);
            info!(
                entries,
                hashes,
                bytes,
                bytes_per_sec = (bytes as f64 / secs) as u64,
                "push progress"
            );
        }
    })
}
