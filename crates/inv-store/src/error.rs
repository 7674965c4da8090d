/// Errors from key-value store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A write was rejected by the backend.
    #[error("could not write key {0:?}")]
    WriteFailed(String),

    /// A removal was rejected by the backend.
    #[error("could not remove key {0:?}")]
    RemoveFailed(String),

    /// Stored bytes are not valid UTF-8 or otherwise undecodable.
    #[error("corrupt entry {key:?}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Snapshot encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A lock holder panicked.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// I/O error from the snapshot file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
