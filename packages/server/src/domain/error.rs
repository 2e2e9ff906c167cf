//! Domain error type shared by the registry, matchmaker and rooms.

use merels_shared::protocol::ErrorKind;
use thiserror::Error;

/// Everything that can go wrong while handling a client event.
///
/// Every variant maps onto a wire [`ErrorKind`]; the error is only ever
/// surfaced to the originating connection, never to the rest of the room.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("room is full")]
    Full,
    #[error("not your turn")]
    NotYourTurn,
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("already in a room")]
    AlreadyInRoom,
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl GameError {
    /// The wire error kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::NotFound(_) => ErrorKind::NotFound,
            GameError::Unauthorized(_) => ErrorKind::Unauthorized,
            GameError::Full => ErrorKind::Full,
            GameError::NotYourTurn => ErrorKind::NotYourTurn,
            GameError::InvalidState(_) => ErrorKind::InvalidState,
            GameError::AlreadyInRoom => ErrorKind::AlreadyInRoom,
            GameError::BadRequest(_) => ErrorKind::BadRequest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            GameError::NotFound("room".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(GameError::NotYourTurn.kind(), ErrorKind::NotYourTurn);
        assert_eq!(GameError::Full.kind(), ErrorKind::Full);
    }
}
