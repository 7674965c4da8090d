use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use inv_jsonrpc::Response as RpcResponse;
use inv_rpc::{Dispatcher, Server, ServerRequest, ServerSession, Session, SessionId, Workqueue};
use serde_json::json;
use tokio::sync::oneshot;

use crate::auth::{AuthProvider, Credentials};

/// Shared state of every request handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub queue: Arc<Workqueue>,
    pub sessions: Arc<Server>,
    pub auth: Arc<dyn AuthProvider>,
    pub client_dn_header: Option<String>,
}

/// Server session of one HTTP exchange. The handler task waits on the
/// receiving end until a worker replies.
pub struct HttpServerSession {
    handle: Option<String>,
    reply: Mutex<Option<oneshot::Sender<Option<RpcResponse>>>>,
    terminated: AtomicBool,
}

impl HttpServerSession {
    pub fn new(handle: Option<String>) -> (Self, oneshot::Receiver<Option<RpcResponse>>) {
        let (tx, rx) = oneshot::channel();
        let session = Self {
            handle,
            reply: Mutex::new(Some(tx)),
            terminated: AtomicBool::new(false),
        };
        (session, rx)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}

impl Session for HttpServerSession {
    fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
        // Dropping the sender wakes the waiting handler.
        self.reply.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

impl ServerSession for HttpServerSession {
    fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    fn reply_async(&self, response: Option<RpcResponse>) {
        let sender = self.reply.lock().unwrap_or_else(PoisonError::into_inner).take();
        match sender {
            Some(sender) => {
                if sender.send(response).is_err() {
                    tracing::warn!("client went away before its reply was ready");
                }
            }
            None => tracing::warn!("reply suppressed: exchange already answered or terminated"),
        }
    }
}

/// Unregisters an exchange's session when the handler finishes or is
/// dropped because the client disconnected.
struct Registration {
    sessions: Arc<Server>,
    id: SessionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.sessions.remove_session(self.id);
    }
}

fn credentials(headers: &HeaderMap, dn_header: Option<&str>) -> Credentials {
    dn_header
        .and_then(|name| headers.get(name))
        .and_then(|value| value.to_str().ok())
        .map(|dn| Credentials::ClientDn(dn.to_string()))
        .unwrap_or(Credentials::Anonymous)
}

/// POST handler of the JSON-RPC endpoint.
pub async fn rpc_handler(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let creds = credentials(&headers, state.client_dn_header.as_deref());
    let identity = match state.auth.authenticate(&creds).await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::warn!(error = %err, "rejected caller");
            return (StatusCode::FORBIDDEN, err.to_string()).into_response();
        }
    };

    let (session, reply) = HttpServerSession::new(identity.handle);
    let session = Arc::new(session);
    let _registration = Registration {
        id: state.sessions.create_session(session.clone()),
        sessions: state.sessions.clone(),
    };
    let dispatcher = state.dispatcher.clone();
    let queued = state.queue.push(ServerRequest::new(body, session), move |request| {
        request.complete(&dispatcher)
    });
    if let Err(err) = queued {
        tracing::warn!(error = %err, "could not queue request");
        return (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response();
    }

    let answer = reply.await;
    match answer {
        Ok(Some(response)) => Json(response.to_value()).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "request was dropped without a reply").into_response(),
    }
}

/// Health check handler.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "name": "inv-server",
        "version": env!("CARGO_PKG_VERSION"),
        "namespaces": state.dispatcher.namespaces(),
        "types": state.dispatcher.model().type_list(),
        "queued": state.queue.size(),
        "sessions": state.sessions.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use inv_jsonrpc::{RequestId, SingleResponse};

    #[test]
    fn credentials_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-client-dn", HeaderValue::from_static("CN=alice"));
        assert_eq!(
            credentials(&headers, Some("X-Client-DN")),
            Credentials::ClientDn("CN=alice".into())
        );
        assert_eq!(credentials(&headers, None), Credentials::Anonymous);
        assert_eq!(credentials(&HeaderMap::new(), Some("x-client-dn")), Credentials::Anonymous);
    }

    #[test]
    fn second_reply_is_suppressed() {
        let (session, mut rx) = HttpServerSession::new(Some("alice".into()));
        assert_eq!(session.handle(), Some("alice"));
        let resp = RpcResponse::Single(SingleResponse::success(Some(RequestId::Number(1)), json!(1)));
        session.reply_async(Some(resp.clone()));
        session.reply_async(None);
        assert_eq!(rx.try_recv().unwrap(), Some(resp));
    }

    #[tokio::test]
    async fn abandoned_exchange_leaves_no_session() {
        use std::sync::mpsc;
        use std::time::Duration;

        use inv_object::Datamodel;
        use inv_store::StoreContext;

        use crate::auth::AnonymousAuth;

        let state = AppState {
            dispatcher: Arc::new(Dispatcher::new(
                Arc::new(StoreContext::in_memory()),
                Arc::new(Datamodel::standard()),
            )),
            queue: Arc::new(Workqueue::new(1).unwrap()),
            sessions: Arc::new(Server::new()),
            auth: Arc::new(AnonymousAuth),
            client_dn_header: None,
        };

        // Occupy the only worker so the exchange cannot be answered.
        let (release, held) = mpsc::channel::<()>();
        state.queue.push(held, |held| {
            let _ = held.recv();
        }).unwrap();

        let body = json!({"jsonrpc": "2.0", "id": 1, "method": "datamodel.types"}).to_string();
        let call = rpc_handler(State(state.clone()), HeaderMap::new(), body);
        let outcome = tokio::time::timeout(Duration::from_millis(100), call).await;
        assert!(outcome.is_err());
        assert_eq!(state.sessions.len(), 0);

        release.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(state.sessions.is_empty());
    }

    #[test]
    fn terminate_wakes_the_waiter() {
        let (session, mut rx) = HttpServerSession::new(None);
        session.terminate();
        assert!(session.is_terminated());
        assert!(rx.try_recv().is_err());
    }
}
