//! Working tree indexing for hashback.
//!
//! Two pieces live here. The [`ShaCache`] remembers, per absolute path, the
//! hash computed for a file at a given modification time and size, so an
//! unchanged tree is not rehashed on every backup. The [`DirectoryBrowser`]
//! walks a tree depth-first, hashes files through the cache, builds the
//! directory descriptors bottom-up, and hands every entry to a consumer as
//! a [`BrowseEvent`].

pub mod browser;
pub mod error;
pub mod sha_cache;

pub use browser::{BrowseEvent, DirectoryBrowser, EntrySource};
pub use error::{IndexError, IndexResult};
pub use sha_cache::{modified_millis, ShaCache, ShaCacheConfig};
