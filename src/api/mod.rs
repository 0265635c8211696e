//! HTTP API module
//!
//! Serves the shared event buffer: a live SSE feed, the session registry and the
//! buffered history.

mod auth;
pub mod routes;
mod sse;

use crate::buffer::EventBuffer;
use crate::config::ServerConfig;
use crate::error::{CoreError, Result};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub buffer: Arc<EventBuffer>,
    pub api_key: Option<String>,
}

/// Bind the first free port in `port..port + span`.
pub async fn bind_in_span(host: &str, port: u16, span: u16) -> Result<TcpListener> {
    let last = port.saturating_add(span.max(1) - 1);
    for candidate in port..=last {
        match TcpListener::bind((host, candidate)).await {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                tracing::debug!("Port {} unavailable: {}", candidate, e);
            }
        }
    }
    Err(CoreError::Api(format!(
        "No free port in {}..={} on {}",
        port, last, host
    )))
}

/// Start the HTTP API server and run it until `shutdown` resolves.
pub async fn serve<F>(config: &ServerConfig, buffer: Arc<EventBuffer>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = bind_in_span(&config.host, config.port, config.port_span).await?;
    serve_on(listener, config.api_key.clone(), buffer, shutdown).await
}

/// Serve on an already-bound listener.
pub async fn serve_on<F>(
    listener: TcpListener,
    api_key: Option<String>,
    buffer: Arc<EventBuffer>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = listener.local_addr()?;
    let app = create_router(AppState { buffer, api_key });

    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| CoreError::Api(e.to_string()))?;
    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - allow all origins for local dashboards
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/sessions", get(routes::list_sessions))
        .route("/sessions/:id/toggle", post(routes::toggle_session))
        .route("/history", get(routes::history));

    let protected = Router::new()
        .route("/events", get(sse::events_handler))
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        // Health check (public, no auth required)
        .route("/health", get(routes::health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
