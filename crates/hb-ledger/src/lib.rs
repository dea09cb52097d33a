//! Source states, transactions, and the commit chain for hashback.
//!
//! A [`SourceStore`] sits on top of an object repository and a reference
//! repository. It owns every state transition of every source: opening a
//! transaction, accepting file descriptors into it, turning it into a
//! directory descriptor and a commit, and moving the commit pointer.
//!
//! ```text
//! [no transaction] --start/continue--> [open, accumulating] --commit--> [no transaction]
//! ```
//!
//! Source states are memoized in memory. Structural transitions are written
//! through immediately; content updates follow the configured
//! [`FlushPolicy`].

pub mod config;
pub mod error;
pub mod peer;
pub mod store;
mod transaction;

pub use config::{FlushPolicy, LedgerConfig};
pub use error::{LedgerError, LedgerResult};
pub use peer::PeerConfig;
pub use store::SourceStore;
