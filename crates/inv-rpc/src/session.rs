//! Session contracts for the two ends of a connection.

use inv_jsonrpc::{Request, Response};

use crate::error::RpcResult;

/// Lifecycle shared by both ends of a connection.
pub trait Session: Send + Sync {
    /// Stop serving. Client calls after this fail with
    /// [`RpcError::SessionClosed`](crate::RpcError::SessionClosed).
    fn terminate(&self);
}

/// Called once with the outcome of an asynchronous call.
pub type ReplyHandler = Box<dyn FnOnce(RpcResult<Response>) + Send>;

/// The calling end of a connection.
///
/// The `_async` variants return as soon as the request is queued; their
/// work and the reply handler run on a worker thread.
pub trait ClientSession: Session {
    /// Blocking round trip. Fails with [`RpcError::NoResponse`] when the
    /// document held only notifications.
    ///
    /// [`RpcError::NoResponse`]: crate::RpcError::NoResponse
    fn call(&self, request: &Request) -> RpcResult<Response>;

    /// Send and wait until the document has been handled, discarding any
    /// response.
    fn notify(&self, request: &Request) -> RpcResult<()>;

    fn call_async(&self, request: Request, handler: ReplyHandler) -> RpcResult<()>;

    fn notify_async(&self, request: Request) -> RpcResult<()>;

    fn is_terminated(&self) -> bool;
}

/// The answering end of a connection.
pub trait ServerSession: Session {
    /// Identity of the peer, if the transport established one.
    fn handle(&self) -> Option<&str>;

    /// Deliver the answer to the pending request. `None` means the request
    /// must go unanswered; the transport still resumes the connection.
    fn reply_async(&self, response: Option<Response>);
}
