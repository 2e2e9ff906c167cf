//! Shared library for the Merels multiplayer session server.
//!
//! Holds everything both the server and its clients need to agree on:
//! the WebSocket wire protocol, timestamp handling, and logging setup.

pub mod logger;
pub mod protocol;
pub mod time;
