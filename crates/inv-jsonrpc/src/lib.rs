//! JSON-RPC 2.0 protocol layer for the inventory object store.
//!
//! Documents are parsed in two steps: text into a `serde_json::Value`, then
//! a structural validation pass into typed requests and responses. Keeping
//! the second step separate lets a batch reject one malformed entry while
//! its siblings still run.

pub mod codec;
pub mod error;
pub mod message;
pub mod namespace;

pub use codec::{parse_request, parse_response, validate_request, validate_response};
pub use error::{ErrorCode, JsonRpcError, JsonRpcResult};
pub use message::{
    ErrorObject, Outcome, ParsedRequest, RejectedRequest, Request, RequestId, Response,
    SingleRequest, SingleResponse, JSONRPC_VERSION,
};
pub use namespace::{Namespace, NAMESPACE_SEPARATOR};
