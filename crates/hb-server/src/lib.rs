//! TCP server for hashback.
//!
//! Serves one store to remote peers: each connection performs the
//! `Hello` handshake and then issues store calls, answered in order.

pub mod config;
pub mod error;
pub mod handler;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{dispatch, error_code};
pub use server::HbServer;
