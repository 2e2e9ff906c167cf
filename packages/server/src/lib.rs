//! Merels session server.
//!
//! Real-time coordinator for two-player Nine Men's Morris sessions:
//! clients connect over WebSocket, are matched into paired rooms through
//! a public FIFO queue or private invite codes, exchange moves and chat,
//! and receive authoritative turn and board bookkeeping. Finished games
//! are recorded best-effort through the persistence gateway.

pub mod config;
pub mod coordinator;
pub mod domain;
pub mod gateway;
pub mod outbox;
pub mod ui;
