use thiserror::Error;

/// Wire-visible error codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    NoSuchObject,
    NoSuchFile,
    ObjectExists,
    AccessDenied,
    Other(i64),
}

impl ErrorCode {
    pub fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::NoSuchObject => -32000,
            Self::NoSuchFile => -32001,
            Self::ObjectExists => -32002,
            Self::AccessDenied => -32003,
            Self::Other(code) => code,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            -32000 => Self::NoSuchObject,
            -32001 => Self::NoSuchFile,
            -32002 => Self::ObjectExists,
            -32003 => Self::AccessDenied,
            other => Self::Other(other),
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum JsonRpcError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// An error response delivered by the remote end.
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },
}

impl JsonRpcError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Parse(_) => ErrorCode::ParseError,
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::InvalidResponse(_) => ErrorCode::InternalError,
            Self::MethodNotFound(_) => ErrorCode::MethodNotFound,
            Self::InvalidParams(_) => ErrorCode::InvalidParams,
            Self::Remote { code, .. } => ErrorCode::from_code(*code),
        }
    }
}

pub type JsonRpcResult<T> = Result<T, JsonRpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_codes() {
        assert_eq!(ErrorCode::ParseError.code(), -32700);
        assert_eq!(ErrorCode::InvalidRequest.code(), -32600);
        assert_eq!(ErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(ErrorCode::InvalidParams.code(), -32602);
        assert_eq!(ErrorCode::InternalError.code(), -32603);
        assert_eq!(ErrorCode::NoSuchObject.code(), -32000);
        assert_eq!(ErrorCode::NoSuchFile.code(), -32001);
    }

    #[test]
    fn codes_map_back() {
        for code in [-32700, -32600, -32601, -32602, -32603, -32000, -32001, -32002, -32003, 7] {
            assert_eq!(ErrorCode::from_code(code).code(), code);
        }
    }

    #[test]
    fn remote_error_keeps_code() {
        let err = JsonRpcError::Remote { code: -32000, message: "gone".into() };
        assert_eq!(err.code(), ErrorCode::NoSuchObject);
        assert_eq!(err.to_string(), "remote error -32000: gone");
    }
}
