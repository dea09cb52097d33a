//! Canonical JSON encoding for hashed objects.
//!
//! Objects go through `serde_json::Value` before being written out. Object
//! maps in `Value` are ordered by key, so the output has sorted keys at every
//! nesting level and no insignificant whitespace. Two implementations that
//! agree on the field names agree on the bytes, and therefore on the hash.

use hb_types::ContentHash;
use serde::Serialize;

use crate::hasher::ContentHasher;

/// Errors from canonical encoding.
#[derive(Debug, thiserror::Error)]
pub enum CanonicalError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Encode a value as canonical JSON bytes.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&value)?)
}

/// Encode a value canonically and hash the result.
pub fn hash_canonical<T: Serialize + ?Sized>(
    value: &T,
) -> Result<(ContentHash, Vec<u8>), CanonicalError> {
    let bytes = canonical_json(value)?;
    Ok((ContentHasher::hash(&bytes), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_types::{Commit, DirectoryDescriptor, FileDescriptor};
    use proptest::prelude::*;

    fn sha(b: u8) -> ContentHash {
        ContentHash::from_digest([b; 32])
    }

    #[test]
    fn keys_are_sorted() {
        let fd = FileDescriptor::file("a.txt", 5, 10, sha(1));
        let json = String::from_utf8(canonical_json(&fd).unwrap()).unwrap();
        let content = json.find("contentSha").unwrap();
        let is_dir = json.find("isDirectory").unwrap();
        let last = json.find("lastWrite").unwrap();
        let name = json.find("\"name\"").unwrap();
        let size = json.find("\"size\"").unwrap();
        assert!(content < is_dir && is_dir < last && last < name && name < size);
        assert!(!json.contains(' '));
    }

    #[test]
    fn commit_encoding_is_stable() {
        let commit = Commit::new(None, sha(2), 1000);
        let a = canonical_json(&commit).unwrap();
        let b = canonical_json(&commit.clone()).unwrap();
        assert_eq!(a, b);
        assert!(String::from_utf8(a).unwrap().starts_with("{\"commitDate\":1000"));
    }

    #[test]
    fn descriptor_hash_ignores_insertion_order() {
        let a = FileDescriptor::file("a.txt", 5, 1, sha(1));
        let b = FileDescriptor::directory("b", 2, sha(2));
        let c = FileDescriptor::file("c.bin", 9, 3, sha(3));

        let forward = DirectoryDescriptor::new(vec![a.clone(), b.clone(), c.clone()]);
        let backward = DirectoryDescriptor::new(vec![c, b, a]);

        let (h1, _) = hash_canonical(&forward).unwrap();
        let (h2, _) = hash_canonical(&backward).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn different_entries_hash_differently() {
        let one = DirectoryDescriptor::new(vec![FileDescriptor::file("a", 1, 1, sha(1))]);
        let two = DirectoryDescriptor::new(vec![FileDescriptor::file("a", 1, 2, sha(1))]);
        assert_ne!(hash_canonical(&one).unwrap().0, hash_canonical(&two).unwrap().0);
    }

    proptest! {
        #[test]
        fn descriptor_hash_is_order_independent(
            names in proptest::collection::btree_set("[a-z]{1,8}", 1..12),
            seed in any::<u64>(),
        ) {
            let entries: Vec<FileDescriptor> = names
                .iter()
                .enumerate()
                .map(|(i, n)| FileDescriptor::file(n.clone(), i as u64, i as i64, sha(i as u8)))
                .collect();
            let mut shuffled = entries.clone();
            // Deterministic rotation + reversal driven by the seed.
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            if seed % 2 == 0 {
                shuffled.reverse();
            }
            let h1 = hash_canonical(&DirectoryDescriptor::new(entries)).unwrap().0;
            let h2 = hash_canonical(&DirectoryDescriptor::new(shuffled)).unwrap().0;
            prop_assert_eq!(h1, h2);
        }
    }
}
