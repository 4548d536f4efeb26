//! Axum HTTP surface: upload endpoint, static artifacts and CORS.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::UploadResponse;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::storage::STATIC_URL_PREFIX;

/// Plain-text body of `GET /`.
pub const SERVICE_NAME: &str = "Depth Map Estimation API";

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
    /// Largest accepted request body.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 5000)),
            max_upload_bytes: 32 * 1024 * 1024,
        }
    }
}

/// State shared by request handlers.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Build the service router.
pub fn router(pipeline: Arc<Pipeline>, config: &ServerConfig) -> Router {
    let static_files = ServeDir::new(pipeline.storage().static_dir());

    Router::new()
        .route("/", get(handlers::index))
        .route("/upload", post(handlers::upload))
        .nest_service(STATIC_URL_PREFIX, static_files)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_origin(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { pipeline })
}

/// Serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(pipeline: Arc<Pipeline>, config: &ServerConfig) -> Result<()> {
    let app = router(pipeline, config);
    let listener = TcpListener::bind(config.address).await?;

    tracing::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
}
