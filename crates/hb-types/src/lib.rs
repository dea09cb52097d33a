//! Foundation types for hashback.
//!
//! Every other `hb-*` crate depends on this one. The types here are the
//! on-disk and on-wire vocabulary of the system, and their JSON field names
//! are part of the storage format: directory descriptors and commits are
//! hashed over their canonical JSON encoding, so renaming a field changes
//! every hash.
//!
//! # Key Types
//!
//! - [`ContentHash`]: SHA-256 digest identifying a byte sequence
//! - [`FileDescriptor`]: one entry (file or directory) of a directory
//! - [`DirectoryDescriptor`]: one level of a tree, stored as an object
//! - [`Commit`]: snapshot record linking a root descriptor to its parent
//! - [`SourceState`]: mutable per-source pointer record

pub mod commit;
pub mod descriptor;
pub mod error;
pub mod hash;
pub mod layout;
pub mod source;

pub use commit::Commit;
pub use descriptor::{DirectoryDescriptor, FileDescriptor};
pub use error::TypeError;
pub use hash::ContentHash;
pub use layout::{is_reserved_name, CACHE_FILE_NAME, OBJECT_DIR_NAME, REFS_DIR_NAME, RESERVED_NAMES};
pub use source::{tags, SourceState};
