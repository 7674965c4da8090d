use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ErrorCode, JsonRpcError, JsonRpcResult};

pub const JSONRPC_VERSION: &str = "2.0";

/// Request identifier: a string or an integer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl RequestId {
    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => Value::from(*n),
            Self::String(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// One call. Without an id it is a notification: processed, never answered.
#[derive(Clone, Debug, PartialEq)]
pub struct SingleRequest {
    pub id: Option<RequestId>,
    pub method: String,
    /// A JSON object, or `Null` when the call carries no params.
    pub params: Value,
}

impl SingleRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Value) -> Self {
        Self {
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.param(name).and_then(Value::as_str)
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("jsonrpc".into(), JSONRPC_VERSION.into());
        if let Some(id) = &self.id {
            obj.insert("id".into(), id.to_value());
        }
        obj.insert("method".into(), self.method.clone().into());
        if !self.params.is_null() {
            obj.insert("params".into(), self.params.clone());
        }
        Value::Object(obj)
    }
}

impl fmt::Display for SingleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

/// Outbound request document.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    Single(SingleRequest),
    Batch(Vec<SingleRequest>),
}

impl Request {
    pub fn to_value(&self) -> Value {
        match self {
            Self::Single(req) => req.to_value(),
            Self::Batch(reqs) => Value::Array(reqs.iter().map(SingleRequest::to_value).collect()),
        }
    }

    /// `true` if no entry expects a response.
    pub fn is_notification(&self) -> bool {
        match self {
            Self::Single(req) => req.is_notification(),
            Self::Batch(reqs) => reqs.iter().all(SingleRequest::is_notification),
        }
    }
}

impl From<SingleRequest> for Request {
    fn from(req: SingleRequest) -> Self {
        Self::Single(req)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

/// A batch entry that failed validation. Answered with an error response
/// under whatever id could still be recovered.
#[derive(Clone, Debug, PartialEq)]
pub struct RejectedRequest {
    pub id: Option<RequestId>,
    pub error: JsonRpcError,
}

impl RejectedRequest {
    pub fn to_response(&self) -> SingleResponse {
        SingleResponse::from_error(self.id.clone(), &self.error)
    }
}

/// Inbound request document after validation.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedRequest {
    Single(SingleRequest),
    Batch(Vec<Result<SingleRequest, RejectedRequest>>),
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Error member of a response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub ec: i64,
    pub message: String,
}

impl ErrorObject {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            ec: code.code(),
            message: message.into(),
        }
    }
}

impl From<&JsonRpcError> for ErrorObject {
    fn from(err: &JsonRpcError) -> Self {
        match err {
            JsonRpcError::Remote { code, message } => Self {
                ec: *code,
                message: message.clone(),
            },
            other => Self::new(other.code(), other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Result(Value),
    Error(ErrorObject),
}

/// Answer to one call. `id` is `None` only when the request's id could not
/// be determined (serialized as `null`).
#[derive(Clone, Debug, PartialEq)]
pub struct SingleResponse {
    pub id: Option<RequestId>,
    pub outcome: Outcome,
}

impl SingleResponse {
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            id,
            outcome: Outcome::Result(result),
        }
    }

    pub fn failure(id: Option<RequestId>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            id,
            outcome: Outcome::Error(ErrorObject::new(code, message)),
        }
    }

    pub fn from_error(id: Option<RequestId>, err: &JsonRpcError) -> Self {
        Self {
            id,
            outcome: Outcome::Error(err.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    /// Turn the outcome into a `Result`, error responses becoming
    /// [`JsonRpcError::Remote`].
    pub fn into_result(self) -> JsonRpcResult<Value> {
        match self.outcome {
            Outcome::Result(value) => Ok(value),
            Outcome::Error(err) => Err(JsonRpcError::Remote {
                code: err.ec,
                message: err.message,
            }),
        }
    }

    pub fn to_value(&self) -> Value {
        let id = self.id.as_ref().map_or(Value::Null, RequestId::to_value);
        match &self.outcome {
            Outcome::Result(result) => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "result": result,
            }),
            Outcome::Error(err) => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "error": { "ec": err.ec, "message": err.message },
            }),
        }
    }
}

/// Response document.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    Single(SingleResponse),
    Batch(Vec<SingleResponse>),
}

impl Response {
    pub fn to_value(&self) -> Value {
        match self {
            Self::Single(resp) => resp.to_value(),
            Self::Batch(resps) => Value::Array(resps.iter().map(SingleResponse::to_value).collect()),
        }
    }

    pub fn into_responses(self) -> Vec<SingleResponse> {
        match self {
            Self::Single(resp) => vec![resp],
            Self::Batch(resps) => resps,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}
