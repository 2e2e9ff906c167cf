//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::coordinator::RoomSummary;
use crate::ui::state::AppState;

/// Health check with live session counters.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let stats = state.coordinator.stats().await;
    Json(serde_json::json!({
        "status": "ok",
        "connected_players": stats.connected_players,
        "active_rooms": stats.active_rooms,
        "waiting_players": stats.waiting_players,
        "open_invites": stats.open_invites,
        "longest_wait_ms": stats.longest_wait_ms,
        "timestamp": merels_shared::time::now_timestamp(),
    }))
}

/// List every live room.
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummary>> {
    Json(state.coordinator.room_summaries().await)
}
