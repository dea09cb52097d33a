use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use hb_ledger::LedgerConfig;
use hb_protocol::MAX_MESSAGE_SIZE;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

pub const DEFAULT_PORT: u16 = 9419;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Directory holding the served store.
    pub store_root: PathBuf,
    pub ledger: LedgerConfig,
    /// Largest accepted frame payload in bytes.
    pub max_frame_size: usize,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            store_root: PathBuf::from("."),
            ledger: LedgerConfig::default(),
            max_frame_size: MAX_MESSAGE_SIZE,
            max_connections: 64,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Load a TOML file. Keys left out keep their defaults.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
