//! Transport layer: axum router, handlers and server lifecycle.

pub mod handler;
pub mod runner;
mod signal;
pub mod state;

pub use runner::{build_router, build_state, run_server};
pub use state::AppState;
