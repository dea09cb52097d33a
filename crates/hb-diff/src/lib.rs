//! Directory tree diff for hashback snapshots.
//!
//! Compares two directory descriptors (or the trees of two commits) and
//! reports what changed, path by path. Subdirectories whose hashes agree are
//! never opened, so the cost of a diff is proportional to what changed.
//!
//! # Key Types
//!
//! - [`TreeDiff`] / [`TreeChange`] -- the list of changes between two trees

pub mod error;
pub mod tree_diff;

pub use error::{DiffError, DiffResult};
pub use tree_diff::{diff_commits, diff_descriptors, diff_directories, TreeChange, TreeDiff};
