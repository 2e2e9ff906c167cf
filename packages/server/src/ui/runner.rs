//! Server wiring and execution.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::coordinator::Coordinator;
use crate::gateway::{HttpResultStore, NullResultStore, ResultStore, spawn_recorder};
use crate::outbox::WebSocketOutbox;

use super::{
    handler::{get_rooms, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Wire up the outbox, result recorder and coordinator for a config.
///
/// Must run inside a tokio runtime: the result recorder task is spawned
/// here.
pub fn build_state(config: ServerConfig) -> Arc<AppState> {
    let store: Arc<dyn ResultStore> = match &config.result_endpoint {
        Some(endpoint) => Arc::new(HttpResultStore::new(endpoint.clone())),
        None => Arc::new(NullResultStore),
    };
    let results = spawn_recorder(store);
    let outbox = WebSocketOutbox::new();
    let coordinator = Coordinator::new(config, outbox.clone(), results);
    Arc::new(AppState {
        coordinator,
        outbox,
    })
}

/// Routes: the WebSocket endpoint plus the read-only HTTP surface.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/health", get(health_check))
        .route("/api/rooms", get(get_rooms))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the session server until a shutdown signal arrives.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = format!("{}:{}", config.host, config.port);
    let state = build_state(config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("session server listening on {}", listener.local_addr()?);
    tracing::info!("connect to: ws://{}/ws", bind_addr);
    tracing::info!("press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");

    Ok(())
}
