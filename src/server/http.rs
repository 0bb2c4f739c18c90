use super::handlers::{api_handler, fallback_handler, health_handler, home_handler};
use super::listener::ListenerHandle;
use crate::{
    api::API_PREFIX,
    cluster::WorkerHandle,
    config::ServerConfig,
    error::{AppError, Result},
    pipeline::RequestPipeline,
};
use axum::{
    routing::{any, get},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ServerState {
    pub(crate) pipeline: Arc<RequestPipeline>,
    pub(crate) worker: Arc<WorkerHandle>,
    /// Largest API request body read before answering 413
    pub(crate) max_body_bytes: usize,
}

/// HTTP front end. Requests under the API prefix go through the request
/// pipeline; everything else is plain glue that bypasses it.
pub struct ApiServer {
    config: ServerConfig,
    state: ServerState,
}

impl ApiServer {
    pub fn new(
        config: ServerConfig,
        pipeline: Arc<RequestPipeline>,
        worker: Arc<WorkerHandle>,
    ) -> Self {
        let state = ServerState {
            pipeline,
            worker,
            max_body_bytes: config.max_body_bytes,
        };

        Self { config, state }
    }

    pub fn router(&self) -> Router {
        let api_wildcard = format!("{}/*path", API_PREFIX);

        Router::new()
            .route("/", get(home_handler))
            .route("/health", get(health_handler))
            .route(API_PREFIX, any(api_handler))
            .route(&api_wildcard, any(api_handler))
            .fallback(fallback_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind the listening socket without serving yet
    pub async fn bind(self) -> Result<BoundServer> {
        let addr = self.config.bind_address();
        let router = self.router();

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Bind {
                address: addr.clone(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;

        info!("API server listening on {}", local_addr);

        Ok(BoundServer {
            listener,
            router,
            local_addr,
        })
    }
}

/// A bound but not yet serving server
pub struct BoundServer {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start serving on a background task
    pub fn spawn(self) -> ListenerHandle {
        let token = CancellationToken::new();
        let shutdown = token.clone();
        let local_addr = self.local_addr;

        let task = tokio::spawn(async move {
            let result = axum::serve(self.listener, self.router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;

            match result {
                Ok(()) => info!("API server on {} closed", local_addr),
                Err(e) => error!("API server error on {}: {}", local_addr, e),
            }
        });

        ListenerHandle::new(token, task)
    }
}
