//! Named mutable references for hashback.
//!
//! Everything in an object repository is immutable and addressed by hash.
//! The few things that do change (where a source's history currently ends,
//! which peers are known, the store's own identity) are kept here instead,
//! as small JSON documents under human-readable names.
//!
//! # Namespace
//!
//! - `source-<id>` holds the state record of one backup source
//! - `peer-<name>` holds the address of a known remote store
//! - `uuid` holds the identity of the store itself
//!
//! Names are case-normalized before use, so `Source-Laptop` and
//! `source-laptop` are the same reference.
//!
//! # Modules
//!
//! - [`error`]: error types for ref operations
//! - [`traits`]: the [`ReferenceRepository`] trait and typed helpers
//! - [`names`]: name normalization
//! - [`fs`]: file-per-reference [`FsRefStore`]
//! - [`memory`]: in-memory [`InMemoryRefStore`] for tests

pub mod error;
pub mod fs;
pub mod memory;
pub mod names;
pub mod traits;

pub use error::{RefError, Result};
pub use fs::FsRefStore;
pub use memory::InMemoryRefStore;
pub use names::normalize_name;
pub use traits::{ReferenceRepository, ReferenceRepositoryExt};
