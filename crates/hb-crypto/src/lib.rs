//! Hashing primitives for hashback.
//!
//! Provides SHA-256 content hashing over slices, readers and files, the
//! canonical JSON encoding used for every hashed object, and the
//! [`FileHasher`] seam that lets repositories validate through a cache.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod canonical;
pub mod hasher;

pub use canonical::{canonical_json, hash_canonical, CanonicalError};
pub use hasher::{ContentHasher, FileHasher, StreamingHasher};
