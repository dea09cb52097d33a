//! Three-stage push of a local directory tree into a store.
//!
//! ```text
//! walk (blocking) --BrowseEvent--> probe (has_bytes) --Probe--> send
//! ```
//!
//! Stages are joined by bounded channels of `queue_capacity` items. A full
//! channel parks its producer until the consumer takes an item, so neither
//! the walk nor the probe stage can run arbitrarily far ahead of the
//! network.

use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use hb_index::{BrowseEvent, DirectoryBrowser, EntrySource};
use hb_types::ContentHash;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::progress::{spawn_reporter, Progress};
use crate::remote::RemoteStore;
use crate::transfer::TransferOutcome;
use crate::types::PushResult;

/// An entry with the byte count the target already holds for it.
/// `remote_offset` is `None` when the target could not be asked.
struct Probe {
    event: BrowseEvent,
    remote_offset: Option<u64>,
}

/// Walk `root` and push everything `target` is missing into a transaction
/// of `source_id`, committing it when every hash made it across.
pub async fn push_directory(
    root: &Path,
    target: Arc<dyn RemoteStore>,
    source_id: &str,
    browser: Arc<DirectoryBrowser>,
    config: &SyncConfig,
) -> SyncResult<PushResult> {
    let tx = target.start_or_continue_transaction(source_id).await?;
    let capacity = config.queue_capacity.max(1);
    let (walk_tx, mut walk_rx) = mpsc::channel::<BrowseEvent>(capacity);
    let (probe_tx, mut probe_rx) = mpsc::channel::<Probe>(capacity);

    let walker = {
        let browser = Arc::clone(&browser);
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || {
            browser.browse(&root, &mut |event| walk_tx.blocking_send(event).is_ok())
        })
    };

    let prober = {
        let target = Arc::clone(&target);
        tokio::spawn(async move {
            while let Some(event) = walk_rx.recv().await {
                let remote_offset = match event.hash() {
                    Some(hash) => match target.has_bytes(&hash).await {
                        Ok(len) => Some(len),
                        Err(e) => {
                            warn!(%hash, error = %e, "has_bytes failed");
                            None
                        }
                    },
                    None => Some(0),
                };
                if probe_tx.send(Probe { event, remote_offset }).await.is_err() {
                    break;
                }
            }
        })
    };

    let progress = Arc::new(Progress::default());
    let reporter = config
        .progress_interval()
        .map(|every| spawn_reporter(Arc::clone(&progress), every));

    let mut sender = Sender {
        target: target.as_ref(),
        browser: &browser,
        source_id,
        tx: &tx,
        chunk_size: config.chunk_size.max(1),
        dedup: HashSet::new(),
        dedup_capacity: config.dedup_capacity.max(1),
        failed: HashSet::new(),
        progress: &progress,
        counts: Counts::default(),
    };
    while let Some(probe) = probe_rx.recv().await {
        sender.handle(probe).await;
    }
    let Sender { failed, counts, .. } = sender;

    if let Some(reporter) = reporter {
        reporter.abort();
    }
    prober.await?;
    let root_hash = walker.await??;

    let commit = if failed.is_empty() {
        target.commit_transaction(source_id, &tx).await?
    } else {
        warn!(
            source = %source_id,
            failed = failed.len(),
            "push incomplete, transaction left open"
        );
        None
    };

    info!(
        source = %source_id,
        root = %root_hash.short_hex(),
        files = counts.files,
        directories = counts.directories,
        hashes = counts.hashes,
        bytes = counts.bytes,
        "push finished"
    );
    Ok(PushResult {
        root_hash,
        commit,
        files: counts.files,
        directories: counts.directories,
        hashes_transferred: counts.hashes,
        bytes_transferred: counts.bytes,
        failed: failed.len(),
    })
}

#[derive(Default)]
struct Counts {
    files: usize,
    directories: usize,
    hashes: usize,
    bytes: u64,
}

struct Sender<'a> {
    target: &'a dyn RemoteStore,
    browser: &'a DirectoryBrowser,
    source_id: &'a str,
    tx: &'a str,
    chunk_size: usize,
    dedup: HashSet<ContentHash>,
    dedup_capacity: usize,
    failed: HashSet<ContentHash>,
    progress: &'a Progress,
    counts: Counts,
}

impl Sender<'_> {
    async fn handle(&mut self, probe: Probe) {
        let Probe { event, remote_offset } = probe;
        if event.descriptor.is_directory {
            self.counts.directories += 1;
        } else {
            self.counts.files += 1;
        }
        self.progress.entry();

        let Some(hash) = event.hash() else {
            warn!(path = %event.relative_path, "entry without hash skipped");
            return;
        };

        let sent = match remote_offset {
            Some(offset) => self.send(&hash, &event, offset).await,
            None => false,
        };
        self.browser.close_entry(&hash);
        if !sent {
            self.failed.insert(hash);
            return;
        }

        if event.is_top_level() {
            match self
                .target
                .push_file_descriptor(self.source_id, self.tx, event.descriptor.clone())
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    warn!(path = %event.relative_path, "target refused top-level entry");
                    self.failed.insert(hash);
                }
                Err(e) => {
                    warn!(path = %event.relative_path, error = %e, "pushing top-level entry failed");
                    self.failed.insert(hash);
                }
            }
        }
    }

    /// Make sure `target` holds the bytes of `hash`. Returns `false` when the
    /// hash could not be transferred.
    async fn send(&mut self, hash: &ContentHash, event: &BrowseEvent, offset: u64) -> bool {
        if self.failed.contains(hash) {
            return false;
        }
        if self.dedup.contains(hash) {
            return true;
        }

        let outcome = match self.browser.entry_source(hash) {
            Some(EntrySource::Bytes(bytes)) => self.send_bytes(hash, bytes, offset).await,
            Some(EntrySource::File(path)) => {
                self.send_file(hash, &path, offset, event.descriptor.size).await
            }
            None => Ok(TransferOutcome::Missing),
        };

        match outcome {
            Ok(outcome) if outcome.is_ok() => {
                if let TransferOutcome::Transferred { bytes } = outcome {
                    self.counts.hashes += 1;
                    self.counts.bytes += bytes;
                    self.progress.transferred(bytes);
                }
                if self.dedup.len() >= self.dedup_capacity {
                    debug!(size = self.dedup.len(), "clearing dedup set");
                    self.dedup.clear();
                }
                self.dedup.insert(*hash);
                true
            }
            Ok(outcome) => {
                warn!(path = %event.relative_path, %hash, ?outcome, "transfer failed");
                false
            }
            Err(e) => {
                warn!(path = %event.relative_path, %hash, error = %e, "transfer failed");
                false
            }
        }
    }

    /// Directory descriptors go out in one call.
    async fn send_bytes(
        &self,
        hash: &ContentHash,
        bytes: Vec<u8>,
        offset: u64,
    ) -> SyncResult<TransferOutcome> {
        let total = bytes.len() as u64;
        if offset >= total {
            return Ok(TransferOutcome::AlreadyPresent);
        }
        let data = Bytes::from(bytes).slice(offset as usize..);
        let sent = data.len() as u64;
        self.target.put_bytes(hash, offset, data).await?;
        self.finish(hash, sent).await
    }

    /// Files are streamed from `offset` to the end in `chunk_size` pieces.
    async fn send_file(
        &self,
        hash: &ContentHash,
        path: &Path,
        offset: u64,
        size: u64,
    ) -> SyncResult<TransferOutcome> {
        if offset >= size {
            return Ok(TransferOutcome::AlreadyPresent);
        }
        let mut file = tokio::fs::File::open(path).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut position = offset;
        let mut buf = vec![0u8; self.chunk_size];
        while position < size {
            let want = self.chunk_size.min((size - position) as usize);
            let n = file.read(&mut buf[..want]).await?;
            if n == 0 {
                warn!(path = %path.display(), position, size, "file shrank while pushing");
                break;
            }
            self.target
                .put_bytes(hash, position, Bytes::copy_from_slice(&buf[..n]))
                .await?;
            position += n as u64;
        }
        self.finish(hash, position - offset).await
    }

    async fn finish(&self, hash: &ContentHash, sent: u64) -> SyncResult<TransferOutcome> {
        if self.target.validate_bytes(hash).await? {
            Ok(TransferOutcome::Transferred { bytes: sent })
        } else {
            Ok(TransferOutcome::ValidationFailed { bytes: sent })
        }
    }
}
