//! Axum request handlers.

pub mod http;
pub mod websocket;

pub use http::{get_rooms, health_check};
pub use websocket::websocket_handler;
