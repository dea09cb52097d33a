use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use hb_types::ContentHash;
use sha2::{Digest, Sha256};

/// Read buffer used when hashing readers and files.
const READ_BUF_SIZE: usize = 64 * 1024;

/// SHA-256 content hasher.
///
/// Content hashes are plain digests of the bytes, without any domain tag, so
/// the same file hashes identically in every store and every implementation.
pub struct ContentHasher;

impl ContentHasher {
    /// Hash raw bytes.
    pub fn hash(data: &[u8]) -> ContentHash {
        let digest: [u8; 32] = Sha256::digest(data).into();
        ContentHash::from_digest(digest)
    }

    /// Hash the UTF-8 bytes of a string.
    pub fn hash_str(s: &str) -> ContentHash {
        Self::hash(s.as_bytes())
    }

    /// Hash everything a reader yields.
    pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<ContentHash> {
        let mut hasher = StreamingHasher::new();
        let mut buf = vec![0u8; READ_BUF_SIZE];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize())
    }

    /// Hash the full contents of a file.
    pub fn hash_file(path: &Path) -> io::Result<ContentHash> {
        Self::hash_reader(File::open(path)?)
    }

    /// Verify that data produces the expected hash.
    pub fn verify(data: &[u8], expected: &ContentHash) -> bool {
        Self::hash(data) == *expected
    }
}

/// Incremental SHA-256 for data that arrives in pieces.
#[derive(Clone, Default)]
pub struct StreamingHasher {
    inner: Sha256,
    len: u64,
}

impl StreamingHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
        self.len += data.len() as u64;
    }

    /// Number of bytes fed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finalize(self) -> ContentHash {
        let digest: [u8; 32] = self.inner.finalize().into();
        ContentHash::from_digest(digest)
    }
}

/// Computes the content hash of a file on disk.
///
/// Object repositories validate blobs through this trait so a caching
/// implementation can skip rehashing unchanged files.
pub trait FileHasher: Send + Sync {
    fn hash_file(&self, path: &Path) -> io::Result<ContentHash>;
}

impl FileHasher for ContentHasher {
    fn hash_file(&self, path: &Path) -> io::Result<ContentHash> {
        ContentHasher::hash_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    #[test]
    fn empty_payload_is_sentinel() {
        assert_eq!(ContentHasher::hash(b""), ContentHash::EMPTY);
        assert_eq!(ContentHasher::hash_str(""), ContentHash::EMPTY);
        assert_eq!(StreamingHasher::new().finalize(), ContentHash::EMPTY);
    }

    #[test]
    fn known_vector() {
        assert_eq!(
            ContentHasher::hash_str("hello").to_hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::hash(b"original");
        assert!(ContentHasher::verify(b"original", &id));
        assert!(!ContentHasher::verify(b"tampered", &id));
    }

    #[test]
    fn file_hash_matches_slice_hash() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"world").unwrap();
        file.flush().unwrap();
        let via_file = ContentHasher::hash_file(file.path()).unwrap();
        assert_eq!(via_file, ContentHasher::hash(b"world"));
        let via_trait = FileHasher::hash_file(&ContentHasher, file.path()).unwrap();
        assert_eq!(via_trait, via_file);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContentHasher::hash_file(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    proptest! {
        #[test]
        fn hash_is_stable(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
            prop_assert_eq!(ContentHasher::hash(&data), ContentHasher::hash(&data));
        }

        #[test]
        fn streaming_matches_one_shot(
            data in proptest::collection::vec(any::<u8>(), 0..4096),
            split in any::<proptest::sample::Index>(),
        ) {
            let at = split.index(data.len() + 1);
            let mut hasher = StreamingHasher::new();
            hasher.update(&data[..at]);
            hasher.update(&data[at..]);
            prop_assert_eq!(hasher.len(), data.len() as u64);
            prop_assert_eq!(hasher.finalize(), ContentHasher::hash(&data));
        }
    }
}
