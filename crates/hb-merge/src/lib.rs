//! Merging external directory trees into hashback sources.
//!
//! A source's current snapshot is opened as a [`TreeNode`] that only loads
//! the subdirectories a merge actually touches. An external directory
//! descriptor is merged into it at some path, the touched nodes are written
//! back bottom-up as new descriptors, and the new root is committed.

pub mod error;
pub mod merge;
pub mod tree;

pub use error::{MergeError, MergeResult};
pub use merge::commit_directory_into_path;
pub use tree::{MergeStats, TreeNode};
