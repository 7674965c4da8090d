use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use inv_jsonrpc::{Request, Response};
use inv_object::Caller;

use crate::call::respond;
use crate::dispatch::Dispatcher;
use crate::error::{RpcError, RpcResult};
use crate::session::{ClientSession, ReplyHandler, Session};
use crate::workqueue::Workqueue;

/// Client session served by a dispatcher in the same process.
///
/// Requests still travel as serialized documents so they pass the same
/// validation as requests from the network.
pub struct LocalClientSession {
    dispatcher: Arc<Dispatcher>,
    queue: Arc<Workqueue>,
    caller: Caller,
    terminated: AtomicBool,
}

impl LocalClientSession {
    pub fn new(dispatcher: Arc<Dispatcher>, queue: Arc<Workqueue>) -> Self {
        let caller = dispatcher.caller(None);
        Self {
            dispatcher,
            queue,
            caller,
            terminated: AtomicBool::new(false),
        }
    }

    /// Act as the peer identified by `handle`.
    pub fn with_handle(mut self, handle: &str) -> Self {
        self.caller = self.dispatcher.caller(Some(handle));
        self
    }

    fn check_open(&self) -> RpcResult<()> {
        if self.is_terminated() {
            return Err(RpcError::SessionClosed);
        }
        Ok(())
    }

    fn queue_job(&self, request: Request, reply: Option<ReplyHandler>) -> RpcResult<()> {
        self.check_open()?;
        let dispatcher = self.dispatcher.clone();
        let caller = self.caller.clone();
        self.queue.push(request, move |request| {
            let outcome = exchange(&dispatcher, &request, &caller);
            match reply {
                Some(reply) => reply(outcome),
                None => match outcome {
                    Ok(_) | Err(RpcError::NoResponse(_)) => {}
                    Err(err) => tracing::debug!(error = %err, "async notification failed"),
                },
            }
        })
    }
}

fn exchange(dispatcher: &Dispatcher, request: &Request, caller: &Caller) -> RpcResult<Response> {
    let body = request.to_value().to_string();
    respond(dispatcher, &body, caller).ok_or_else(|| RpcError::NoResponse(describe(request)))
}

fn describe(request: &Request) -> String {
    match request {
        Request::Single(single) => single.method.clone(),
        Request::Batch(entries) => format!("batch of {}", entries.len()),
    }
}

impl Session for LocalClientSession {
    fn terminate(&self) {
        if !self.terminated.swap(true, Ordering::AcqRel) {
            tracing::debug!("local session terminated");
        }
    }
}

impl ClientSession for LocalClientSession {
    fn call(&self, request: &Request) -> RpcResult<Response> {
        self.check_open()?;
        exchange(&self.dispatcher, request, &self.caller)
    }

    fn notify(&self, request: &Request) -> RpcResult<()> {
        self.check_open()?;
        match exchange(&self.dispatcher, request, &self.caller) {
            Ok(_) | Err(RpcError::NoResponse(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn call_async(&self, request: Request, handler: ReplyHandler) -> RpcResult<()> {
        self.queue_job(request, Some(handler))
    }

    fn notify_async(&self, request: Request) -> RpcResult<()> {
        self.queue_job(request, None)
    }

    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    use inv_jsonrpc::{RequestId, SingleRequest};
    use inv_object::Datamodel;
    use inv_store::StoreContext;
    use serde_json::json;

    fn session() -> LocalClientSession {
        let dispatcher = Dispatcher::new(Arc::new(StoreContext::in_memory()), Arc::new(Datamodel::standard()));
        LocalClientSession::new(Arc::new(dispatcher), Arc::new(Workqueue::new(2).unwrap()))
    }

    fn types_call() -> Request {
        SingleRequest::new(RequestId::Number(1), "datamodel.types", json!({})).into()
    }

    #[test]
    fn call_round_trip() {
        let Response::Single(resp) = session().call(&types_call()).unwrap() else {
            panic!("expected a single response");
        };
        assert_eq!(resp.id, Some(RequestId::Number(1)));
        assert!(resp.into_result().unwrap().as_array().unwrap().len() >= 7);
    }

    #[test]
    fn notifications_have_no_response() {
        let s = session();
        let note: Request = SingleRequest::notification("datamodel.types", json!({})).into();
        assert!(matches!(s.call(&note), Err(RpcError::NoResponse(_))));
        s.notify(&note).unwrap();
    }

    #[test]
    fn async_reply_runs_on_a_worker() {
        let s = session();
        let (tx, rx) = mpsc::channel();
        let caller_thread = std::thread::current().id();
        s.call_async(
            types_call(),
            Box::new(move |outcome| {
                tx.send((outcome.is_ok(), std::thread::current().id())).unwrap();
            }),
        )
        .unwrap();
        let (ok, thread) = rx.recv().unwrap();
        assert!(ok);
        assert_ne!(thread, caller_thread);
    }

    #[test]
    fn terminated_sessions_refuse_calls() {
        let s = session();
        s.terminate();
        assert!(s.is_terminated());
        assert!(matches!(s.call(&types_call()), Err(RpcError::SessionClosed)));
        assert!(matches!(
            s.notify_async(types_call()),
            Err(RpcError::SessionClosed)
        ));
    }
}
