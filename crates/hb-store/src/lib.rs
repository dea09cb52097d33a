//! Content-addressed object repository for hashback.
//!
//! Every byte sequence the system knows about (file contents, directory
//! descriptors and commits) lives here under the SHA-256 of its bytes. Unlike a
//! whole-object store, the repository accepts writes in pieces: a transfer
//! can stop half way and resume later from whatever length the repository
//! reports, and nothing is trusted until [`ObjectRepository::validate_bytes`]
//! has re-hashed the blob.
//!
//! # Backends
//!
//! All backends implement the [`ObjectRepository`] trait:
//!
//! - [`FsObjectRepository`] -- sharded directory layout, one open write
//!   handle per hash
//! - [`InMemoryObjectRepository`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. A blob is only mutated during its resumable-write window; once it
//!    validates it is immutable.
//! 2. A failed validation moves the blob aside, so a hash is never falsely
//!    reported as present.
//! 3. The empty-payload hash is answered without touching storage.
//! 4. Writes to one hash go through one handle; callers serialize per hash.
//! 5. Missing blobs are `None`, not errors.

pub mod bulk;
pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use bulk::{demux_bulk_stream, mux_bulk_stream, BulkDescriptor, BulkReport, Compression};
pub use error::{StoreError, StoreResult};
pub use fs::FsObjectRepository;
pub use memory::InMemoryObjectRepository;
pub use traits::{ObjectRepository, ObjectRepositoryExt};
