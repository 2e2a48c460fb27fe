//! Web layer module
//!
//! HTTP interface for the image-vault service: thin handlers over the
//! injected collaborators (object store, response cache, ingestion
//! service), a permissive CORS layer, and request logging.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, Method};
use axum::routing::{get, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::services::IngestService;
use crate::storage::ObjectStore;

pub mod handlers;
pub mod middleware;
pub mod responses;

/// Shared application state injected into every handler
///
/// Collaborators are explicit `Arc` handles rather than module-level
/// singletons so tests can substitute any of them.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ObjectStore>,
    pub cache: Arc<ResponseCache>,
    pub ingest: Arc<IngestService>,
}

/// Build the application router with the CORS and logging layers applied.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-api-key")])
        .max_age(std::time::Duration::from_secs(86_400));

    let max_upload_bytes = state.config.ingest.max_upload_bytes;

    Router::new()
        .route("/upload", put(handlers::upload))
        .route("/images/{key}", get(handlers::get_image))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(axum::middleware::from_fn(
            middleware::request_logging_middleware,
        ))
        .layer(cors)
        .with_state(state)
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(state: AppState) -> Result<Self> {
        let addr: SocketAddr =
            format!("{}:{}", state.config.web.host, state.config.web.port).parse()?;
        Ok(Self {
            app: create_router(state),
            addr,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until shutdown.
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, self.app).await?;
        Ok(())
    }

    /// Bind, report the bind outcome through `ready_signal`, then serve
    /// until a shutdown signal arrives.
    pub async fn serve_with_signal(
        self,
        ready_signal: tokio::sync::oneshot::Sender<Result<()>>,
    ) -> Result<()> {
        match tokio::net::TcpListener::bind(&self.addr).await {
            Ok(listener) => {
                // Signal that we're now actually listening on the port
                let _ = ready_signal.send(Ok(()));

                axum::serve(listener, self.app)
                    .with_graceful_shutdown(shutdown_signal())
                    .await?;
                Ok(())
            }
            Err(e) => {
                let _ = ready_signal.send(Err(anyhow::anyhow!(
                    "failed to bind {}: {}",
                    self.addr,
                    e
                )));
                Err(anyhow::anyhow!("failed to bind {}: {}", self.addr, e))
            }
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, shutting down gracefully");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT (Ctrl+C), shutting down gracefully");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        tracing::info!("Received Ctrl+C, shutting down gracefully");
    }
}
