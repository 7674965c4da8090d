//! Storage contract for the inventory object store.
//!
//! The object layer never interprets bytes itself; it only needs an ordered
//! key-value store with point reads, writes, removals and a prefix cursor.
//! Relational meaning comes entirely from the key codec in `inv-types`.
//!
//! # Storage Backends
//!
//! All backends implement the [`KvStore`] trait:
//!
//! - [`InMemoryKvStore`] -- `BTreeMap`-based store with optional snapshot file
//!
//! # Locking
//!
//! [`StoreContext`] pairs a backend with one reader/writer lock per
//! capability. Loads take the capability lock shared, commits take it
//! exclusive, so a reader never sees one direction of a two-key edge
//! without the other.

pub mod context;
pub mod error;
pub mod memory;
pub mod traits;

pub use context::{LockDomain, StoreContext};
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryKvStore, MemoryCursor};
pub use traits::{Cursor, KvStore};
