//! Legacy bulk streams.
//!
//! Older peers shipped many blobs in one byte stream, described by a list of
//! `{hash, offset, length}` triples. The stream is the concatenation of every
//! range in descriptor order, optionally zstd-compressed. The live protocol
//! moves one hash at a time; this module only exists to accept (and, in
//! tests, produce) the old format.

use std::io::{self, Read};

use hb_types::ContentHash;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectRepository;

const DEMUX_BUF_SIZE: usize = 64 * 1024;

/// One range of one blob inside a bulk stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDescriptor {
    pub hash: ContentHash,
    /// Offset in the blob where this range starts.
    pub offset: u64,
    /// Number of stream bytes belonging to this range.
    pub length: u64,
}

/// Compression applied to a whole bulk stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Zstd,
}

/// Totals from a demux run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub ranges: usize,
    pub bytes: u64,
}

/// Split a bulk stream into the repository.
///
/// Consumes exactly `length` bytes for each descriptor, writing them at the
/// descriptor's offset, and closes the blob's handle once its range is done.
/// Blobs are not validated here; the caller validates after the last range.
pub fn demux_bulk_stream<'a, R: Read + 'a>(
    repo: &dyn ObjectRepository,
    descriptors: &[BulkDescriptor],
    reader: R,
    compression: Compression,
) -> StoreResult<BulkReport> {
    let mut reader: Box<dyn Read + 'a> = match compression {
        Compression::None => Box::new(reader),
        Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
    };

    let mut buf = vec![0u8; DEMUX_BUF_SIZE];
    let mut report = BulkReport::default();

    for desc in descriptors {
        let mut remaining = desc.length;
        let mut offset = desc.offset;
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let n = match reader.read(&mut buf[..want]) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                return Err(StoreError::TruncatedStream {
                    hash: desc.hash,
                    expected: desc.length,
                    actual: desc.length - remaining,
                });
            }
            repo.put_bytes(&desc.hash, offset, &buf[..n])?;
            offset += n as u64;
            remaining -= n as u64;
        }
        repo.close_handle(&desc.hash)?;
        report.ranges += 1;
        report.bytes += desc.length;
        debug!(hash = %desc.hash.short_hex(), length = desc.length, "demuxed range");
    }

    Ok(report)
}

/// Build a bulk stream for `descriptors` from the repository's contents.
pub fn mux_bulk_stream(
    repo: &dyn ObjectRepository,
    descriptors: &[BulkDescriptor],
    compression: Compression,
) -> StoreResult<Vec<u8>> {
    let mut out = Vec::new();
    for desc in descriptors {
        let bytes = repo
            .read_bytes(&desc.hash, desc.offset, desc.length)?
            .ok_or(StoreError::NotFound(desc.hash))?;
        if bytes.len() as u64 != desc.length {
            return Err(StoreError::TruncatedStream {
                hash: desc.hash,
                expected: desc.length,
                actual: bytes.len() as u64,
            });
        }
        out.extend_from_slice(&bytes);
    }
    match compression {
        Compression::None => Ok(out),
        Compression::Zstd => Ok(zstd::encode_all(out.as_slice(), 0)?),
    }
}
