//! HTTP API: JSON endpoints for clients plus the SSE push channel

pub mod handlers;
pub mod sse;

use crate::library::LibraryIndex;
use crate::player::PlayerGateway;
use crate::reconciler::Phase;
use crate::store::StateStore;
use crate::votes::VoteEngine;
use axum::{
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<StateStore>,
    pub library: Arc<LibraryIndex>,
    pub votes: VoteEngine,
    pub gateway: Arc<dyn PlayerGateway>,
    /// Follows the reconciler's phase, reported by `/api/status`
    pub phase: watch::Receiver<Phase>,
    /// Player directory the library is loaded from
    pub library_directory: String,
    /// Cancelled on shutdown; ends every open SSE stream so the server can drain
    pub shutdown: CancellationToken,
}

/// Build the router; `static_dir` (if any) is served at `/`
pub fn create_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/status", get(handlers::status))
        .route("/api/library", get(handlers::library))
        .route("/api/library/refresh", post(handlers::refresh_library))
        .route("/api/propose", post(handlers::propose))
        .route("/api/vote", post(handlers::vote))
        .route("/api/state", get(handlers::get_state))
        .route("/api/events", get(sse::event_stream))
        .with_state(ctx);

    let app = match static_dir {
        Some(dir) => {
            info!("Serving static files from {}", dir.display());
            api.fallback_service(ServeDir::new(dir))
        }
        None => api,
    };

    app.layer(TraceLayer::new_for_http())
        // Browser clients may be served from another origin
        .layer(CorsLayer::permissive())
}
