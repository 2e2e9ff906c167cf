//! Shared application state for the axum handlers.

use std::sync::Arc;

use crate::coordinator::Coordinator;
use crate::outbox::WebSocketOutbox;

/// Injected into every handler; constructed once in the runner.
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub outbox: Arc<WebSocketOutbox>,
}
