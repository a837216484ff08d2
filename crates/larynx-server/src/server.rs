use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use larynx_engine::GenerationEndpoint;

use crate::handlers;

/// Server configuration.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Reported by `GET /`.
    pub service_name: String,
    /// Whether this build carries a local inference engine.
    pub engine_available: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            service_name: "Larynx Generation Service".into(),
            engine_available: false,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub endpoint: Arc<GenerationEndpoint>,
    pub service_name: String,
    pub engine_available: bool,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/generate", post(handlers::generate))
        .route("/chat", post(handlers::generate))
        .route("/metrics", get(handlers::metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and start serving. Returns once the listener is bound.
pub async fn start(
    config: ServerConfig,
    endpoint: Arc<GenerationEndpoint>,
) -> Result<ServerHandle, std::io::Error> {
    let state = AppState {
        endpoint,
        service_name: config.service_name,
        engine_available: config.engine_available,
    };

    let router = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(host = %config.host, port = local_addr.port(), "larynx server started");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "server exited");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        server,
    })
}

/// Handle returned by `start()`. Dropping it leaves the server running;
/// call [`ServerHandle::shutdown`] to stop it.
pub struct ServerHandle {
    pub port: u16,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub fn shutdown(self) {
        self.server.abort();
    }
}
