use std::future::Future;
use std::sync::Arc;

use inv_object::Datamodel;
use inv_rpc::{Dispatcher, Server, Workqueue};
use inv_store::{InMemoryKvStore, StoreContext};
use tokio::net::TcpListener;

use crate::auth::{AnonymousAuth, AuthProvider, DnAuth};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Inventory object store served over HTTP.
pub struct InvServer {
    config: ServerConfig,
    store: Arc<InMemoryKvStore>,
    state: AppState,
}

impl InvServer {
    /// Open the store and start the worker pool. Callers behind a client
    /// certificate header are identified by its CN; everybody else is
    /// anonymous.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        Self::with_model(config, Datamodel::standard())
    }

    pub fn with_model(config: ServerConfig, model: Datamodel) -> ServerResult<Self> {
        config.validate()?;
        let store = Arc::new(match &config.data_file {
            Some(path) => InMemoryKvStore::open(path)?,
            None => InMemoryKvStore::new(),
        });
        let ctx = StoreContext::new(store.clone());
        let dispatcher = Dispatcher::new(Arc::new(ctx), Arc::new(model))
            .with_enforce_acl(config.enforce_acl);
        let auth: Arc<dyn AuthProvider> = match config.client_dn_header {
            Some(_) => Arc::new(DnAuth {
                require_certificate: config.enforce_acl,
            }),
            None => Arc::new(AnonymousAuth),
        };
        let state = AppState {
            dispatcher: Arc::new(dispatcher),
            queue: Arc::new(Workqueue::new(config.workers)?),
            sessions: Arc::new(Server::new()),
            auth,
            client_dn_header: config.client_dn_header.clone(),
        };
        Ok(Self { config, store, state })
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.state.auth = auth;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.state.dispatcher
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone(), &self.config)
    }

    /// Serve on the configured address until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve_on(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves, then terminate the
    /// open sessions and flush the store.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            "inventory server listening on {addr}{} ({} workers)",
            self.config.rpc_path,
            self.state.queue.workers()
        );
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        self.state.sessions.terminate_all();
        self.store.flush()?;
        tracing::info!("inventory server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
