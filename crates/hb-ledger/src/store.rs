use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use hb_index::ShaCache;
use hb_refs::{normalize_name, FsRefStore, ReferenceRepository, ReferenceRepositoryExt};
use hb_store::{FsObjectRepository, ObjectRepository, ObjectRepositoryExt};
use hb_types::{
    Commit, ContentHash, DirectoryDescriptor, SourceState, OBJECT_DIR_NAME, REFS_DIR_NAME,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::peer::PeerConfig;

const SOURCE_PREFIX: &str = "source-";
const PEER_PREFIX: &str = "peer-";
const UUID_REF: &str = "uuid";

pub(crate) struct CachedState {
    pub(crate) state: SourceState,
    dirty: bool,
    last_flush: Instant,
}

pub(crate) type StateTable = HashMap<String, CachedState>;

/// Transactional snapshot engine over an object and a reference repository.
pub struct SourceStore {
    objects: Arc<dyn ObjectRepository>,
    refs: Arc<dyn ReferenceRepository>,
    config: LedgerConfig,
    states: Mutex<StateTable>,
    uuid: String,
}

impl std::fmt::Debug for SourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceStore")
            .field("uuid", &self.uuid)
            .field("config", &self.config)
            .finish()
    }
}

impl SourceStore {
    /// Build a store over existing repositories, minting the store UUID on
    /// first use.
    pub fn new(
        objects: Arc<dyn ObjectRepository>,
        refs: Arc<dyn ReferenceRepository>,
        config: LedgerConfig,
    ) -> LedgerResult<Self> {
        let uuid = match refs.get_typed::<String>(UUID_REF)? {
            Some(uuid) => uuid,
            None => {
                let uuid = Uuid::now_v7().to_string();
                refs.put_typed(UUID_REF, &uuid)?;
                info!(%uuid, "initialized new store");
                uuid
            }
        };
        Ok(Self {
            objects,
            refs,
            config,
            states: Mutex::new(HashMap::new()),
            uuid,
        })
    }

    /// Open the on-disk store rooted at `root`.
    ///
    /// Blobs go to `<root>/.hb-object`, references to `<root>/.hb-refs`, and
    /// blob validation goes through the hash cache of `root`. A relative
    /// `root` is resolved against the working directory, since the hash
    /// cache keys files by absolute path.
    pub fn open(root: &Path, config: LedgerConfig) -> LedgerResult<Self> {
        let root = &std::path::absolute(root).map_err(hb_store::StoreError::from)?;
        std::fs::create_dir_all(root).map_err(hb_store::StoreError::from)?;
        let cache = ShaCache::open(root, config.sha_cache.clone())?;
        let objects = FsObjectRepository::open(root.join(OBJECT_DIR_NAME))?
            .with_hasher(Arc::new(cache));
        let refs = FsRefStore::open(root.join(REFS_DIR_NAME))?;
        debug!(root = %root.display(), "opened store");
        Self::new(Arc::new(objects), Arc::new(refs), config)
    }

    pub fn objects(&self) -> &Arc<dyn ObjectRepository> {
        &self.objects
    }

    pub fn refs(&self) -> &Arc<dyn ReferenceRepository> {
        &self.refs
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Identity of this store.
    pub fn get_uuid(&self) -> &str {
        &self.uuid
    }

    // ---------------------------------------------------------------
    // Source states
    // ---------------------------------------------------------------

    /// Ids of all sources with a persisted or pending state.
    pub fn get_sources(&self) -> LedgerResult<Vec<String>> {
        let mut ids = Vec::new();
        for name in self.refs.list_with_prefix(SOURCE_PREFIX)? {
            match self.refs.get_typed::<SourceState>(&format!("{SOURCE_PREFIX}{name}")) {
                Ok(Some(state)) => ids.push(state.id),
                Ok(None) => {}
                Err(e) => warn!(source = %name, error = %e, "skipping unreadable source state"),
            }
        }
        for cached in self.lock_states()?.values() {
            if cached.dirty && !ids.contains(&cached.state.id) {
                ids.push(cached.state.id.clone());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Current state of `source`; a fresh state if the source is unknown.
    pub fn get_source_state(&self, source: &str) -> LedgerResult<SourceState> {
        let mut states = self.lock_states()?;
        Ok(self.cached(&mut states, source)?.state.clone())
    }

    /// Point `source` at an existing commit.
    pub fn set_source_commit(&self, source: &str, commit: &ContentHash) -> LedgerResult<()> {
        if self.get_commit(commit).is_none() {
            return Err(LedgerError::CommitNotFound(*commit));
        }
        let mut states = self.lock_states()?;
        let cached = self.cached(&mut states, source)?;
        cached.state.current_commit_sha = Some(*commit);
        self.persist(cached)?;
        info!(%source, commit = %commit.short_hex(), "moved source pointer");
        Ok(())
    }

    /// Set a named flag on `source`.
    pub fn set_source_tag(&self, source: &str, tag: &str, value: bool) -> LedgerResult<()> {
        let mut states = self.lock_states()?;
        let cached = self.cached(&mut states, source)?;
        cached.state.set_tag(tag, value);
        self.persist(cached)
    }

    // ---------------------------------------------------------------
    // Objects
    // ---------------------------------------------------------------

    /// Load a commit, or `None` if it is missing or unreadable.
    pub fn get_commit(&self, hash: &ContentHash) -> Option<Commit> {
        match self.objects.read_object::<Commit>(hash) {
            Ok(commit) => commit,
            Err(e) => {
                warn!(hash = %hash, error = %e, "failed to read commit");
                None
            }
        }
    }

    /// Load a directory descriptor, or `None` if it is missing or unreadable.
    pub fn get_directory_descriptor(&self, hash: &ContentHash) -> Option<DirectoryDescriptor> {
        match self.objects.read_object::<DirectoryDescriptor>(hash) {
            Ok(desc) => desc,
            Err(e) => {
                warn!(hash = %hash, error = %e, "failed to read directory descriptor");
                None
            }
        }
    }

    /// Stream the bytes of a blob over `[start, end)`.
    pub fn read_sha_as_stream(
        &self,
        hash: &ContentHash,
        start: u64,
        end: Option<u64>,
    ) -> LedgerResult<Option<Box<dyn Read + Send>>> {
        Ok(self.objects.read_as_stream(hash, start, end)?)
    }

    /// Commits of `source` from newest to oldest, at most `limit` of them.
    ///
    /// The walk stops early at a commit that is not present.
    pub fn history(
        &self,
        source: &str,
        limit: Option<usize>,
    ) -> LedgerResult<Vec<(ContentHash, Commit)>> {
        let mut out = Vec::new();
        let mut next = self.get_source_state(source)?.current_commit_sha;
        while let Some(hash) = next {
            if limit.is_some_and(|l| out.len() >= l) {
                break;
            }
            let Some(commit) = self.get_commit(&hash) else {
                warn!(%source, commit = %hash, "history ends at missing commit");
                break;
            };
            next = commit.parent_sha;
            out.push((hash, commit));
        }
        Ok(out)
    }

    // ---------------------------------------------------------------
    // Peers
    // ---------------------------------------------------------------

    pub fn get_peer(&self, name: &str) -> LedgerResult<Option<PeerConfig>> {
        Ok(self.refs.get_typed(&format!("{PEER_PREFIX}{name}"))?)
    }

    pub fn put_peer(&self, peer: &PeerConfig) -> LedgerResult<()> {
        Ok(self.refs.put_typed(&format!("{PEER_PREFIX}{}", peer.name), peer)?)
    }

    pub fn remove_peer(&self, name: &str) -> LedgerResult<()> {
        Ok(self.refs.delete(&format!("{PEER_PREFIX}{name}"))?)
    }

    pub fn list_peers(&self) -> LedgerResult<Vec<PeerConfig>> {
        let mut peers = Vec::new();
        for name in self.refs.list_with_prefix(PEER_PREFIX)? {
            if let Some(peer) = self.get_peer(&name)? {
                peers.push(peer);
            }
        }
        Ok(peers)
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Write every state with pending content updates.
    pub fn flush(&self) -> LedgerResult<()> {
        let mut states = self.lock_states()?;
        for cached in states.values_mut().filter(|c| c.dirty) {
            self.persist(cached)?;
        }
        Ok(())
    }

    pub(crate) fn lock_states(&self) -> LedgerResult<MutexGuard<'_, StateTable>> {
        self.states.lock().map_err(|_| LedgerError::LockPoisoned)
    }

    /// The memoized state of `source`, loaded or created on first use.
    pub(crate) fn cached<'a>(
        &self,
        states: &'a mut StateTable,
        source: &str,
    ) -> LedgerResult<&'a mut CachedState> {
        let key = normalize_name(&state_ref(source))?;
        if !states.contains_key(&key) {
            let state = match self.refs.get_typed::<SourceState>(&key) {
                Ok(Some(state)) => state,
                Ok(None) => SourceState::new(source),
                Err(e) => {
                    warn!(%source, error = %e, "unreadable source state, starting fresh");
                    SourceState::new(source)
                }
            };
            states.insert(
                key.clone(),
                CachedState {
                    state,
                    dirty: false,
                    last_flush: Instant::now(),
                },
            );
        }
        states.get_mut(&key).ok_or(LedgerError::LockPoisoned)
    }

    /// Write a state through now.
    pub(crate) fn persist(&self, cached: &mut CachedState) -> LedgerResult<()> {
        self.refs
            .put_typed(&state_ref(&cached.state.id), &cached.state)?;
        cached.dirty = false;
        cached.last_flush = Instant::now();
        Ok(())
    }

    /// Record a content update, writing it if the flush policy says so.
    pub(crate) fn touch(&self, cached: &mut CachedState) -> LedgerResult<()> {
        cached.dirty = true;
        if cached.last_flush.elapsed() >= self.config.flush_policy.interval() {
            self.persist(cached)?;
        }
        Ok(())
    }
}

impl Drop for SourceStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "failed to flush source states on drop");
        }
    }
}

fn state_ref(source: &str) -> String {
    format!("{SOURCE_PREFIX}{source}")
}
