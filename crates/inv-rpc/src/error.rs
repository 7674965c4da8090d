use inv_jsonrpc::{ErrorCode, ErrorObject, JsonRpcError, Outcome, RequestId, SingleResponse};
use inv_object::ObjectError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Protocol(#[from] JsonRpcError),

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error("There's no \"{0}\" namespace.")]
    NoSuchNamespace(String),

    #[error("session is closed")]
    SessionClosed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("work queue has stopped")]
    QueueStopped,

    #[error("invalid use: {0}")]
    InvalidUse(String),

    #[error("no response for request {0}")]
    NoResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Protocol(err) => err.code(),
            Self::Object(err) => err.code(),
            Self::NoSuchNamespace(_) => ErrorCode::InvalidRequest,
            Self::SessionClosed
            | Self::Transport(_)
            | Self::QueueStopped
            | Self::InvalidUse(_)
            | Self::NoResponse(_)
            | Self::Io(_) => ErrorCode::InternalError,
        }
    }

    /// Error response answering the request `id`.
    ///
    /// Remote errors keep the code and message they arrived with.
    pub fn to_response(&self, id: Option<RequestId>) -> SingleResponse {
        let error = match self {
            Self::Protocol(err) | Self::Object(ObjectError::Protocol(err)) => ErrorObject::from(err),
            other => ErrorObject::new(other.code(), other.to_string()),
        };
        SingleResponse {
            id,
            outcome: Outcome::Error(error),
        }
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
