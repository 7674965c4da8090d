use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use inv_jsonrpc::{parse_response, Request, Response};
use inv_rpc::{ClientSession, ReplyHandler, RpcError, RpcResult, Session, Workqueue};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;

use crate::config::ClientConfig;
use crate::error::{ServerError, ServerResult};

/// Client session POSTing request documents to an inventory server.
///
/// Blocking calls run on the calling thread; it must not be inside an
/// async runtime.
pub struct HttpClientSession {
    url: String,
    http: Client,
    queue: Arc<Workqueue>,
    terminated: AtomicBool,
}

impl HttpClientSession {
    pub fn new(config: &ClientConfig) -> ServerResult<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| ServerError::Http(e.to_string()))?;
        Ok(Self {
            url: config.url.clone(),
            http,
            queue: Arc::new(Workqueue::new(config.workers)?),
            terminated: AtomicBool::new(false),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn check_open(&self) -> RpcResult<()> {
        if self.is_terminated() {
            return Err(RpcError::SessionClosed);
        }
        Ok(())
    }

    fn queue_job(&self, request: Request, reply: Option<ReplyHandler>) -> RpcResult<()> {
        self.check_open()?;
        let http = self.http.clone();
        let url = self.url.clone();
        self.queue.push(request, move |request| {
            let outcome = exchange(&http, &url, &request);
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

fn exchange(http: &Client, url: &str, request: &Request) -> RpcResult<Response> {
    let body = request.to_value().to_string();
    tracing::debug!(url, bytes = body.len(), "posting request");
    let reply = http
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .map_err(|e| RpcError::Transport(e.to_string()))?;
    let status = reply.status();
    if status == StatusCode::NO_CONTENT {
        return Err(RpcError::NoResponse(url.to_string()));
    }
    if !status.is_success() {
        let detail = reply.text().unwrap_or_default();
        return Err(RpcError::Transport(format!("HTTP {status}: {detail}")));
    }
    let text = reply.text().map_err(|e| RpcError::Transport(e.to_string()))?;
    Ok(parse_response(&text)?)
}

impl Session for HttpClientSession {
    fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
    }
}

impl ClientSession for HttpClientSession {
    fn call(&self, request: &Request) -> RpcResult<Response> {
        self.check_open()?;
        exchange(&self.http, &self.url, request)
    }

    fn notify(&self, request: &Request) -> RpcResult<()> {
        self.check_open()?;
        match exchange(&self.http, &self.url, request) {
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

    use inv_jsonrpc::{ErrorCode, RequestId, SingleRequest};
    use inv_rpc::ClientRequest;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use crate::config::ServerConfig;
    use crate::server::InvServer;

    struct Running {
        runtime: tokio::runtime::Runtime,
        stop: Option<oneshot::Sender<()>>,
        url: String,
    }

    impl Drop for Running {
        fn drop(&mut self) {
            if let Some(stop) = self.stop.take() {
                let _ = stop.send(());
            }
            self.runtime.block_on(tokio::task::yield_now());
        }
    }

    fn start() -> Running {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let listener = runtime.block_on(TcpListener::bind("127.0.0.1:0")).unwrap();
        let url = format!("http://{}/rpc", listener.local_addr().unwrap());
        let server = InvServer::new(ServerConfig::default()).unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        runtime.spawn(server.serve_on(listener, async {
            let _ = stopped.await;
        }));
        Running { runtime, stop: Some(stop), url }
    }

    fn session(url: &str) -> Arc<dyn ClientSession> {
        let config = ClientConfig { url: url.to_string(), workers: 1 };
        Arc::new(HttpClientSession::new(&config).unwrap())
    }

    #[test]
    fn round_trip_over_http() {
        let server = start();
        let session = session(&server.url);

        let types = SingleRequest::new(RequestId::Number(1), "datamodel.types", json!({}));
        let Response::Single(resp) = ClientRequest::new(&session, types).complete().unwrap() else {
            panic!("expected a single response");
        };
        assert!(resp.into_result().unwrap().as_array().unwrap().contains(&json!("Item")));

        let missing = SingleRequest::new(
            RequestId::Number(2),
            "object.repr.get",
            json!({"type": "Item", "id": "nope"}),
        );
        let err = ClientRequest::new(&session, missing).complete().unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoSuchObject);
    }

    #[test]
    fn notifications_and_async_calls() {
        let server = start();
        let session = session(&server.url);
        let note: Request = SingleRequest::notification("datamodel.types", json!({})).into();
        session.notify(&note).unwrap();
        assert!(matches!(session.call(&note), Err(RpcError::NoResponse(_))));

        let (tx, rx) = mpsc::channel();
        let types: Request = SingleRequest::new(RequestId::Number(3), "datamodel.types", json!({})).into();
        session
            .call_async(types, Box::new(move |outcome| tx.send(outcome.is_ok()).unwrap()))
            .unwrap();
        assert!(rx.recv().unwrap());
    }

    #[test]
    fn unreachable_server_is_a_transport_error() {
        let session = session("http://127.0.0.1:9/rpc");
        let types: Request = SingleRequest::new(RequestId::Number(1), "datamodel.types", json!({})).into();
        assert!(matches!(session.call(&types), Err(RpcError::Transport(_))));
        session.terminate();
        assert!(matches!(session.call(&types), Err(RpcError::SessionClosed)));
    }
}
