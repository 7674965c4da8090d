use inv_jsonrpc::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rpc error: {0}")]
    Rpc(#[from] inv_rpc::RpcError),

    #[error("store error: {0}")]
    Store(#[from] inv_store::StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("http client error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AuthFailed(_) => ErrorCode::AccessDenied,
            Self::Rpc(err) => err.code(),
            _ => ErrorCode::InternalError,
        }
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
