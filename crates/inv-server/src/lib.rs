//! HTTP transport for the inventory object store.
//!
//! The server accepts JSON-RPC documents on a single POST endpoint and
//! answers with the response document, or `204 No Content` when the
//! document held only notifications. Each exchange is one server session:
//! the request is queued for a worker and the connection waits for the
//! reply without blocking the runtime.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use auth::{common_name, AnonymousAuth, AuthProvider, Credentials, DnAuth, Identity};
pub use client::HttpClientSession;
pub use config::{ClientConfig, ServerConfig, DEFAULT_PORT, DEFAULT_RPC_PATH};
pub use error::{ServerError, ServerResult};
pub use handler::{AppState, HttpServerSession};
pub use server::InvServer;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use inv_object::{Object, Owner};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn rpc(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/rpc")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn rpc_as(dn: &str, body: Value) -> Request<Body> {
        let mut request = rpc(body);
        request.headers_mut().insert("x-client-dn", dn.parse().unwrap());
        request
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn router() -> axum::Router {
        InvServer::new(ServerConfig::default()).unwrap().router()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn info_endpoint() {
        let response = router()
            .oneshot(Request::builder().uri("/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let info = json_body(response).await;
        assert_eq!(info["name"], "inv-server");
        assert!(info["types"].as_array().unwrap().contains(&json!("Owner")));
    }

    #[tokio::test]
    async fn rpc_call() {
        let response = router()
            .oneshot(rpc(json!({"jsonrpc": "2.0", "id": 7, "method": "datamodel.types"})))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body = json_body(response).await;
        assert_eq!(body["id"], 7);
        assert!(body["result"].as_array().unwrap().contains(&json!("Item")));
    }

    #[tokio::test]
    async fn notification_gets_no_content() {
        let response = router()
            .oneshot(rpc(json!({"jsonrpc": "2.0", "method": "datamodel.types"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn malformed_document_is_a_parse_error() {
        let request = Request::builder()
            .method("POST")
            .uri("/rpc")
            .body(Body::from("{oops"))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), 200);
        let body = json_body(response).await;
        assert_eq!(body["error"]["ec"], -32700);
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn oversized_body_is_refused() {
        let config = ServerConfig {
            max_body_bytes: 64,
            ..ServerConfig::default()
        };
        let app = InvServer::new(config).unwrap().router();
        let padding = "x".repeat(256);
        let response = app
            .oneshot(rpc(json!({"jsonrpc": "2.0", "id": 1, "method": "datamodel.types", "params": {"pad": padding}})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn access_modes_follow_the_certificate() {
        let config = ServerConfig {
            enforce_acl: true,
            client_dn_header: Some("x-client-dn".into()),
            ..ServerConfig::default()
        };
        let app = InvServer::new(config).unwrap().router();

        let create = json!({
            "jsonrpc": "2.0", "id": 1, "method": "object.repr.create",
            "params": {"type": "Owner", "repr": Object::of::<Owner>().repr()},
        });
        let created = json_body(app.clone().oneshot(rpc_as("CN=alice,O=Shop", create)).await.unwrap()).await;
        let id = created["result"].as_str().unwrap().to_string();

        let get = json!({
            "jsonrpc": "2.0", "id": 2, "method": "object.repr.get",
            "params": {"type": "Owner", "id": id.clone()},
        });
        let mine = json_body(app.clone().oneshot(rpc_as("CN=alice,O=Shop", get.clone())).await.unwrap()).await;
        assert_eq!(mine["result"]["id"], id.as_str());

        let theirs = json_body(app.clone().oneshot(rpc_as("CN=bob,O=Shop", get)).await.unwrap()).await;
        assert_eq!(theirs["error"]["ec"], -32003);

        let anonymous = app.oneshot(rpc(json!({"jsonrpc": "2.0", "id": 3, "method": "datamodel.types"}))).await.unwrap();
        assert_eq!(anonymous.status(), StatusCode::FORBIDDEN);
    }
}
