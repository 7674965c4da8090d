use crate::error::StoreResult;

/// Ordered byte-string key-value store.
///
/// Implementations must be safe for concurrent use. The object layer adds
/// its own coarse per-capability locking on top (see
/// [`crate::StoreContext`]) and does not rely on the backend for ordering
/// between keys.
pub trait KvStore: Send + Sync {
    /// Read a value. Returns `Ok(None)` if the key is absent.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Create or overwrite a key. Returns `Ok(false)` if the backend
    /// declined the write.
    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<bool>;

    /// Delete a key. Returns `Ok(true)` if the key existed.
    fn remove(&self, key: &[u8]) -> StoreResult<bool>;

    /// Open a cursor over the key space in ascending order.
    fn cursor(&self) -> StoreResult<Box<dyn Cursor + '_>>;

    /// Whether a key exists.
    fn check(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Collect every entry whose key starts with `prefix`, in key order.
    ///
    /// Default implementation jumps a cursor to `prefix` and walks until the
    /// first key outside it.
    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut cursor = self.cursor()?;
        cursor.jump(prefix)?;
        let mut out = Vec::new();
        while let Some((key, value)) = cursor.get_next(true)? {
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key, value));
        }
        Ok(out)
    }
}

/// Forward cursor over a [`KvStore`].
pub trait Cursor {
    /// Position the cursor at the first key greater than or equal to
    /// `prefix`.
    fn jump(&mut self, prefix: &[u8]) -> StoreResult<()>;

    /// Return the entry under the cursor, moving past it when `advance` is
    /// set. Returns `Ok(None)` once the key space is exhausted.
    fn get_next(&mut self, advance: bool) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>>;
}
