//! Domain model: the pieces the session coordinator owns and mutates.

mod error;
mod matchmaker;
mod registry;
mod room;

pub use error::GameError;
pub use matchmaker::{CODE_LENGTH, Enqueue, Matchmaker};
pub use registry::{ConnectionId, ConnectionRegistry, Player};
pub use room::{ChatEntry, GameSummary, MoveOutcome, Room, RoomStatus, Seat, Visibility};
