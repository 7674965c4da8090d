use std::collections::BTreeMap;
use std::io::Write;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::traits::{Cursor, KvStore};

type Entries = BTreeMap<Vec<u8>, Vec<u8>>;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Entries,
}

/// In-memory, `BTreeMap`-based ordered store.
///
/// Intended for tests, embedding, and small deployments. When opened with a
/// path the whole key space can be written to a `bincode` snapshot with
/// [`InMemoryKvStore::flush`] and is reloaded on the next
/// [`InMemoryKvStore::open`].
pub struct InMemoryKvStore {
    entries: RwLock<Entries>,
    path: Option<PathBuf>,
}

impl InMemoryKvStore {
    /// Create a new empty store with no backing file.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            path: None,
        }
    }

    /// Open a store backed by a snapshot file, loading it if present.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let bytes = std::fs::read(&path)?;
            let snapshot: Snapshot = bincode::deserialize(&bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            if snapshot.version != SNAPSHOT_VERSION {
                return Err(StoreError::Serialization(format!(
                    "unsupported snapshot version {}",
                    snapshot.version
                )));
            }
            tracing::info!(path = %path.display(), entries = snapshot.entries.len(), "loaded store snapshot");
            snapshot.entries
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            entries: RwLock::new(entries),
            path: Some(path),
        })
    }

    /// Backing snapshot path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the snapshot file atomically. No-op for a purely in-memory
    /// store.
    pub fn flush(&self) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = {
            let entries = self.read_entries()?;
            let snapshot = Snapshot {
                version: SNAPSHOT_VERSION,
                entries: entries.clone(),
            };
            bincode::serialize(&snapshot).map_err(|e| StoreError::Serialization(e.to_string()))?
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "flushed store snapshot");
        Ok(())
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.read_entries().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns `true` if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys in ascending order, lossily decoded.
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .read_entries()?
            .keys()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .collect())
    }

    fn read_entries(&self) -> StoreResult<RwLockReadGuard<'_, Entries>> {
        self.entries
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write_entries(&self) -> StoreResult<RwLockWriteGuard<'_, Entries>> {
        self.entries
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for InMemoryKvStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.read_entries()?.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<bool> {
        self.write_entries()?.insert(key.to_vec(), value.to_vec());
        Ok(true)
    }

    fn remove(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.write_entries()?.remove(key).is_some())
    }

    fn cursor(&self) -> StoreResult<Box<dyn Cursor + '_>> {
        Ok(Box::new(MemoryCursor {
            store: self,
            position: None,
            inclusive: true,
        }))
    }

    fn check(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.read_entries()?.contains_key(key))
    }
}

impl std::fmt::Debug for InMemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKvStore")
            .field("key_count", &self.len())
            .field("path", &self.path)
            .finish()
    }
}

/// Cursor over an [`InMemoryKvStore`].
///
/// Holds only its position, not the map lock, so a cursor left open never
/// blocks writers. Each step re-reads the map from the last key seen.
pub struct MemoryCursor<'a> {
    store: &'a InMemoryKvStore,
    position: Option<Vec<u8>>,
    inclusive: bool,
}

impl Cursor for MemoryCursor<'_> {
    fn jump(&mut self, prefix: &[u8]) -> StoreResult<()> {
        self.position = Some(prefix.to_vec());
        self.inclusive = true;
        Ok(())
    }

    fn get_next(&mut self, advance: bool) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        let entries = self.store.read_entries()?;
        let lower = match &self.position {
            None => Bound::Unbounded,
            Some(pos) if self.inclusive => Bound::Included(pos.clone()),
            Some(pos) => Bound::Excluded(pos.clone()),
        };
        let entry = entries
            .range::<Vec<u8>, _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()));
        if advance {
            if let Some((key, _)) = &entry {
                self.position = Some(key.clone());
                self.inclusive = false;
            }
        }
        Ok(entry)
    }
}
