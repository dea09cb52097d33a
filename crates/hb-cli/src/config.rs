use std::path::Path;

use anyhow::Context;
use hb_ledger::LedgerConfig;
use hb_sync::SyncConfig;
use serde::{Deserialize, Serialize};

pub const SETTINGS_FILE: &str = "hashback.toml";

/// Settings of the command-line client, read from the store directory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ledger: LedgerConfig,
    pub sync: SyncConfig,
}

impl Settings {
    /// Read `hashback.toml` from `store`; defaults when the file is absent.
    pub fn load(store: &Path) -> anyhow::Result<Self> {
        let path = store.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load(dir.path()).unwrap(), Settings::default());
    }

    #[test]
    fn sections_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            "[sync]\nchunk_size = 4096\nmax_conflict_depth = 100\n",
        )
        .unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.sync.chunk_size, 4096);
        assert_eq!(settings.sync.max_conflict_depth, Some(100));
        assert_eq!(settings.sync.queue_capacity, SyncConfig::default().queue_capacity);
        assert_eq!(settings.ledger, LedgerConfig::default());
    }
}
