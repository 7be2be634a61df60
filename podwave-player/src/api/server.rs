//! HTTP server setup and routing

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{handlers, sse};
use crate::error::{Error, Result};
use crate::session::PlaybackSession;
use crate::source::NarrationSource;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub session: PlaybackSession,
    pub source: Arc<dyn NarrationSource>,
    /// Cancelled at shutdown; stops work spawned by handlers
    pub background: CancellationToken,
}

/// Build the router with all routes attached
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/build_info", get(handlers::build_info))

        // Playback control
        .route("/playback/state", get(handlers::get_playback_state))
        .route("/playback/position", get(handlers::get_position))
        .route("/playback/play", post(handlers::play))
        .route("/playback/toggle", post(handlers::toggle))
        .route("/playback/seek", post(handlers::seek))
        .route("/playback/rate", post(handlers::set_rate))
        .route("/playback/rate/next", post(handlers::next_rate))
        .route("/playback/close", post(handlers::close))

        // Narration catalogue
        .route("/narrations", get(handlers::library).post(handlers::create_narration))
        .route("/narrations/trending", get(handlers::trending))
        .route(
            "/narrations/:id",
            get(handlers::get_narration).delete(handlers::delete_narration),
        )
        .route("/tasks/:task_id", get(handlers::task_status))

        // SSE event stream
        .route("/events", get(sse::event_stream))

        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the API until `shutdown` resolves
pub async fn run<F>(port: u16, ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
