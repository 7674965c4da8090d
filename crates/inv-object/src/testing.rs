//! Storage doubles for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use inv_store::{Cursor, InMemoryKvStore, KvStore, StoreContext, StoreResult};

/// In-memory store that accepts a fixed number of writes, then declines
/// every further `set`. Reads and removes keep working.
pub struct WriteBudget {
    inner: InMemoryKvStore,
    remaining: AtomicUsize,
}

impl WriteBudget {
    pub fn context(writes: usize) -> StoreContext {
        StoreContext::new(Arc::new(Self {
            inner: InMemoryKvStore::new(),
            remaining: AtomicUsize::new(writes),
        }))
    }
}

impl KvStore for WriteBudget {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<bool> {
        let granted = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if granted {
            self.inner.set(key, value)
        } else {
            Ok(false)
        }
    }

    fn remove(&self, key: &[u8]) -> StoreResult<bool> {
        self.inner.remove(key)
    }

    fn cursor(&self) -> StoreResult<Box<dyn Cursor + '_>> {
        self.inner.cursor()
    }
}
