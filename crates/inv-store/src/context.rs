use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryKvStore;
use crate::traits::KvStore;

/// Relation family guarded by one process-wide reader/writer lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LockDomain {
    /// Object index keys (existence checks around create).
    Index,
    Attributes,
    Association,
    Hierarchy,
    Modes,
    Global,
}

const DOMAIN_COUNT: usize = 6;

impl LockDomain {
    fn slot(self) -> usize {
        self as usize
    }
}

/// Shared storage handle passed to every capability operation.
///
/// Holds the backend plus one lock per [`LockDomain`]. A capability takes
/// its lock shared for the whole of a load and exclusive for the whole of a
/// commit. Locks of different domains are never held at the same time, so
/// there is no lock ordering to get wrong; the price is that a commit
/// touching several capabilities is not atomic as a whole.
pub struct StoreContext {
    store: Arc<dyn KvStore>,
    locks: [RwLock<()>; DOMAIN_COUNT],
}

impl StoreContext {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            locks: Default::default(),
        }
    }

    /// Context over a fresh [`InMemoryKvStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryKvStore::new()))
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    /// Acquire `domain` for reading.
    pub fn shared(&self, domain: LockDomain) -> StoreResult<RwLockReadGuard<'_, ()>> {
        self.locks[domain.slot()]
            .read()
            .map_err(|e| StoreError::LockPoisoned(format!("{domain:?}: {e}")))
    }

    /// Acquire `domain` for writing.
    pub fn exclusive(&self, domain: LockDomain) -> StoreResult<RwLockWriteGuard<'_, ()>> {
        self.locks[domain.slot()]
            .write()
            .map_err(|e| StoreError::LockPoisoned(format!("{domain:?}: {e}")))
    }

    pub fn get_str(&self, key: &str) -> StoreResult<Option<String>> {
        match self.store.get(key.as_bytes())? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StoreError::Corrupt {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Write a key, failing if the backend declines.
    pub fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        tracing::debug!(key, "set");
        if self.store.set(key.as_bytes(), value.as_bytes())? {
            Ok(())
        } else {
            Err(StoreError::WriteFailed(key.to_string()))
        }
    }

    /// Remove a key. A key that was already absent is not an error.
    pub fn delete(&self, key: &str) -> StoreResult<bool> {
        let existed = self.store.remove(key.as_bytes())?;
        if existed {
            tracing::debug!(key, "remove");
        } else {
            tracing::debug!(key, "remove of absent key");
        }
        Ok(existed)
    }

    pub fn exists(&self, key: &str) -> StoreResult<bool> {
        self.store.check(key.as_bytes())
    }

    /// Every entry under `prefix` as UTF-8 strings, in key order.
    pub fn scan(&self, prefix: &str) -> StoreResult<Vec<(String, String)>> {
        self.store
            .scan_prefix(prefix.as_bytes())?
            .into_iter()
            .map(|(k, v)| {
                let key = String::from_utf8(k).map_err(|e| StoreError::Corrupt {
                    key: String::from_utf8_lossy(e.as_bytes()).into_owned(),
                    reason: e.to_string(),
                })?;
                let value = String::from_utf8(v).map_err(|e| StoreError::Corrupt {
                    key: key.clone(),
                    reason: e.to_string(),
                })?;
                Ok((key, value))
            })
            .collect()
    }
}

impl std::fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreContext").finish_non_exhaustive()
    }
}
