use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handler::{self, AppState};

/// Build the axum router: the JSON-RPC endpoint plus health and info.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route(&config.rpc_path, post(handler::rpc_handler))
        .route("/health", get(handler::health_handler))
        .route("/info", get(handler::info_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
