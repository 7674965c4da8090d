use serde_json::{Map, Value};

use crate::error::{JsonRpcError, JsonRpcResult};
use crate::message::{
    ErrorObject, Outcome, ParsedRequest, RejectedRequest, RequestId, Response, SingleResponse,
    SingleRequest, JSONRPC_VERSION,
};

/// Parse and validate an inbound request document.
///
/// Malformed JSON and a malformed single request fail as a whole. Inside a
/// batch each entry is validated on its own so one bad entry cannot take
/// its siblings down with it.
pub fn parse_request(text: &str) -> JsonRpcResult<ParsedRequest> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| JsonRpcError::Parse(e.to_string()))?;
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(JsonRpcError::InvalidRequest("empty batch".into()));
            }
            let entries: Vec<_> = items.iter().map(validate_request).collect();
            for rejected in entries.iter().filter_map(|e| e.as_ref().err()) {
                tracing::debug!(id = ?rejected.id, error = %rejected.error, "rejected batch entry");
            }
            Ok(ParsedRequest::Batch(entries))
        }
        Value::Object(_) => validate_request(&value)
            .map(ParsedRequest::Single)
            .map_err(|rejected| rejected.error),
        _ => Err(JsonRpcError::InvalidRequest(
            "request must be an object or an array".into(),
        )),
    }
}

fn parse_id(value: Option<&Value>) -> Result<Option<RequestId>, String> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(RequestId::String(s.clone()))),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|n| Some(RequestId::Number(n)))
            .ok_or_else(|| "id must be a string or an integer".to_string()),
        Some(_) => Err("id must be a string or an integer".to_string()),
    }
}

fn check_version(obj: &Map<String, Value>) -> Result<(), String> {
    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => Ok(()),
        Some(other) => Err(format!("unsupported protocol version {other:?}")),
        None => Err("missing \"jsonrpc\" member".to_string()),
    }
}

/// Validate one request object.
pub fn validate_request(value: &Value) -> Result<SingleRequest, RejectedRequest> {
    let reject = |id: Option<RequestId>, reason: String| RejectedRequest {
        id,
        error: JsonRpcError::InvalidRequest(reason),
    };

    let Some(obj) = value.as_object() else {
        return Err(reject(None, "request is not an object".into()));
    };
    let id = parse_id(obj.get("id")).map_err(|reason| reject(None, reason))?;
    check_version(obj).map_err(|reason| reject(id.clone(), reason))?;

    let method = match obj.get("method") {
        Some(Value::String(m)) if !m.is_empty() => m.clone(),
        Some(Value::String(_)) => return Err(reject(id, "method is empty".into())),
        Some(_) => return Err(reject(id, "method is not a string".into())),
        None => return Err(reject(id, "missing \"method\" member".into())),
    };

    let params = match obj.get("params") {
        None | Some(Value::Null) => Value::Null,
        Some(p @ Value::Object(_)) => p.clone(),
        Some(_) => return Err(reject(id, "params must be an object".into())),
    };

    Ok(SingleRequest { id, method, params })
}

/// Parse and validate a response document.
pub fn parse_response(text: &str) -> JsonRpcResult<Response> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| JsonRpcError::Parse(e.to_string()))?;
    match &value {
        Value::Array(items) => items
            .iter()
            .map(validate_response)
            .collect::<JsonRpcResult<Vec<_>>>()
            .map(Response::Batch),
        Value::Object(_) => validate_response(&value).map(Response::Single),
        _ => Err(JsonRpcError::InvalidResponse(
            "response must be an object or an array".into(),
        )),
    }
}

/// Validate one response object.
pub fn validate_response(value: &Value) -> JsonRpcResult<SingleResponse> {
    let invalid = |reason: &str| JsonRpcError::InvalidResponse(reason.to_string());

    let obj = value
        .as_object()
        .ok_or_else(|| invalid("response is not an object"))?;
    check_version(obj).map_err(|reason| JsonRpcError::InvalidResponse(reason))?;

    let id = match obj.get("id") {
        None => return Err(invalid("missing \"id\" member")),
        Some(Value::Null) => None,
        other => parse_id(other).map_err(|reason| JsonRpcError::InvalidResponse(reason))?,
    };

    let outcome = match (obj.get("result"), obj.get("error")) {
        (Some(_), Some(_)) => return Err(invalid("both \"result\" and \"error\" present")),
        (None, None) => return Err(invalid("neither \"result\" nor \"error\" present")),
        (Some(result), None) => Outcome::Result(result.clone()),
        (None, Some(error)) => {
            let ec = error
                .get("ec")
                .and_then(Value::as_i64)
                .ok_or_else(|| invalid("error lacks an integer \"ec\""))?;
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("error lacks a string \"message\""))?;
            Outcome::Error(ErrorObject {
                ec,
                message: message.to_string(),
            })
        }
    };

    Ok(SingleResponse { id, outcome })
}
