use inv_jsonrpc::{ErrorCode, JsonRpcError};
use inv_store::StoreError;
use inv_types::{KeyError, Right};

/// Errors from object lifecycle and object-level RPC.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("no such object: {type_name}:{id}")]
    NoSuchObject { type_name: String, id: String },

    #[error("object already exists: {type_name}:{id}")]
    ObjectExists { type_name: String, id: String },

    #[error("no such type: {0}")]
    NoSuchType(String),

    #[error("invalid repr: {0}")]
    InvalidRepr(String),

    #[error("no such method: {0}")]
    NoSuchMethod(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("invalid id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("{0} object has no id")]
    MissingId(String),

    #[error("{type_name} objects have no {capability} capability")]
    MissingCapability {
        type_name: String,
        capability: &'static str,
    },

    #[error("access denied: {right:?} on {path}")]
    AccessDenied { path: String, right: Right },

    #[error("could not mint a unique {type_name} id in {attempts} attempts")]
    StorageExhausted { type_name: String, attempts: usize },

    #[error("key error: {0}")]
    Key(#[from] KeyError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Protocol(#[from] JsonRpcError),
}

impl ObjectError {
    /// Wire code reported when this error answers an RPC call.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoSuchObject { .. } => ErrorCode::NoSuchObject,
            Self::ObjectExists { .. } => ErrorCode::ObjectExists,
            Self::NoSuchType(_) => ErrorCode::InvalidRequest,
            Self::NoSuchMethod(_) => ErrorCode::MethodNotFound,
            Self::InvalidRepr(_)
            | Self::InvalidParams(_)
            | Self::InvalidId { .. }
            | Self::MissingId(_)
            | Self::MissingCapability { .. }
            | Self::Key(_) => ErrorCode::InvalidParams,
            Self::AccessDenied { .. } => ErrorCode::AccessDenied,
            Self::StorageExhausted { .. } | Self::Store(_) => ErrorCode::InternalError,
            Self::Protocol(err) => err.code(),
        }
    }
}

/// Result alias for object operations.
pub type ObjectResult<T> = Result<T, ObjectError>;
