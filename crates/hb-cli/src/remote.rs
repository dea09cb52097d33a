use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use hb_ledger::{LedgerConfig, SourceStore};
use hb_sync::{LocalStore, RemoteStore, TcpRemote};
use tracing::debug;

/// Where a remote store lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteSpec {
    /// `host:port` of a hashback server.
    Tcp(String),
    /// Root of a store on a local or mounted filesystem.
    Directory(PathBuf),
}

impl RemoteSpec {
    /// Parse an address: `tcp://host:port` or a store directory.
    pub fn parse(address: &str) -> Self {
        match address.strip_prefix("tcp://") {
            Some(rest) => Self::Tcp(rest.to_string()),
            None => Self::Directory(PathBuf::from(address)),
        }
    }

    /// Resolve a command-line remote. A bare word names a registered peer
    /// when one exists; anything else is an address.
    pub fn resolve(name_or_address: &str, store: &SourceStore) -> anyhow::Result<Self> {
        let bare = !name_or_address.contains("://")
            && !name_or_address.contains(['/', '\\']);
        if !bare {
            return Ok(Self::parse(name_or_address));
        }
        if let Some(peer) = store.get_peer(name_or_address)? {
            debug!(peer = %peer.name, address = %peer.address, "resolved peer");
            return Ok(Self::parse(&peer.address));
        }
        Ok(Self::parse(name_or_address))
    }

    pub async fn connect(&self, ledger: &LedgerConfig) -> anyhow::Result<Arc<dyn RemoteStore>> {
        match self {
            Self::Tcp(addr) => {
                let remote = TcpRemote::connect(addr)
                    .await
                    .with_context(|| format!("connecting to {addr}"))?;
                Ok(Arc::new(remote))
            }
            Self::Directory(root) => {
                let store = SourceStore::open(root, ledger.clone())
                    .with_context(|| format!("opening store at {}", root.display()))?;
                Ok(Arc::new(LocalStore::new(Arc::new(store))))
            }
        }
    }
}

impl std::fmt::Display for RemoteSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Directory(root) => write!(f, "{}", root.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_ledger::PeerConfig;

    #[test]
    fn parse_forms() {
        assert_eq!(
            RemoteSpec::parse("tcp://nas:9419"),
            RemoteSpec::Tcp("nas:9419".into())
        );
        assert_eq!(
            RemoteSpec::parse("/mnt/backup"),
            RemoteSpec::Directory(PathBuf::from("/mnt/backup"))
        );
        assert_eq!(RemoteSpec::parse("tcp://nas:9419").to_string(), "tcp://nas:9419");
    }

    #[test]
    fn peers_resolve_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = SourceStore::open(dir.path(), LedgerConfig::default()).unwrap();
        store.put_peer(&PeerConfig::new("nas", "tcp://nas:9419")).unwrap();

        assert_eq!(
            RemoteSpec::resolve("nas", &store).unwrap(),
            RemoteSpec::Tcp("nas:9419".into())
        );
        assert_eq!(
            RemoteSpec::resolve("/elsewhere", &store).unwrap(),
            RemoteSpec::Directory(PathBuf::from("/elsewhere"))
        );
        assert_eq!(
            RemoteSpec::resolve("mirror", &store).unwrap(),
            RemoteSpec::Directory(PathBuf::from("mirror"))
        );
    }

    #[tokio::test]
    async fn directory_remote_opens_a_store() {
        let dir = tempfile::tempdir().unwrap();
        let spec = RemoteSpec::Directory(dir.path().to_path_buf());
        let remote = spec.connect(&LedgerConfig::default()).await.unwrap();
        assert!(remote.get_sources().await.unwrap().is_empty());
        assert!(!remote.get_uuid().await.unwrap().is_empty());
    }
}
