use thiserror::Error;

/// Errors produced while building or decoding composite keys.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("empty key token")]
    EmptyToken,

    #[error("token {token:?} contains reserved separator {separator:?}")]
    ReservedSeparator { token: String, separator: char },

    #[error("malformed key {path:?}: expected {expected} tokens, found {found}")]
    Malformed {
        path: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid mode {0:?}")]
    InvalidMode(String),
}

/// Result alias for key operations.
pub type KeyResult<T> = Result<T, KeyError>;
