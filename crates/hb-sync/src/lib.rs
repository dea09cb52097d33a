//! Synchronization between hashback stores.
//!
//! Every store is reached through [`RemoteStore`], whether it lives in this
//! process ([`LocalStore`]) or behind a socket ([`TcpRemote`]). On top of
//! that interface:
//!
//! - [`transfer_bytes`] copies one blob, resuming from what the destination
//!   already holds and validating at the end;
//! - [`pull`] copies a source's commit chain and trees, oldest commit first;
//! - [`push_directory`] walks a local tree through a bounded three-stage
//!   pipeline and commits it as one snapshot.

pub mod config;
pub mod error;
pub mod local;
pub mod progress;
pub mod pull;
pub mod push;
pub mod remote;
pub mod tcp;
pub mod transfer;
pub mod types;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use local::LocalStore;
pub use pull::pull;
pub use push::push_directory;
pub use remote::RemoteStore;
pub use tcp::TcpRemote;
pub use transfer::{transfer_bytes, TransferOutcome};
pub use types::{PullOptions, PullResult, PullStatus, PushResult};
