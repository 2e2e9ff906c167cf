//! WebSocket wire protocol for game sessions.
//!
//! All frames are JSON objects tagged with a `type` field. [`ClientEvent`]
//! covers everything a client may send, [`ServerEvent`] everything the
//! server emits. Payloads are validated at deserialization time; anything
//! that fails to parse is answered with an `error` frame of kind
//! [`ErrorKind::BadRequest`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of cells on a Nine Men's Morris board.
pub const BOARD_CELLS: usize = 24;

/// Pieces each side starts with.
pub const DEFAULT_STARTING_PIECES: u8 = 9;

/// A board snapshot: each cell is empty or owned by one of the two slots.
pub type Board = [Option<Slot>; BOARD_CELLS];

/// An all-empty board.
pub fn empty_board() -> Board {
    [None; BOARD_CELLS]
}

/// Unique identifier of a room, distinct from its human-facing access code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(Uuid);

impl RoomId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Short human-shareable code identifying a private room for joining.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessCode(String);

impl AccessCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One of the two fixed participant positions in a room.
///
/// Serialized as `1` (host) or `2` (guest) on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Slot {
    Host,
    Guest,
}

impl Slot {
    /// The opposing slot.
    pub fn other(self) -> Self {
        match self {
            Slot::Host => Slot::Guest,
            Slot::Guest => Slot::Host,
        }
    }

    /// Zero-based index for per-slot counter arrays.
    pub fn index(self) -> usize {
        match self {
            Slot::Host => 0,
            Slot::Guest => 1,
        }
    }
}

impl From<Slot> for u8 {
    fn from(slot: Slot) -> u8 {
        match slot {
            Slot::Host => 1,
            Slot::Guest => 2,
        }
    }
}

impl TryFrom<u8> for Slot {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Slot::Host),
            2 => Ok(Slot::Guest),
            other => Err(format!("invalid slot number: {other}")),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Sub-state of an active room's game logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Placing,
    Moving,
    Flying,
    Removing,
}

/// What a move does to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveAction {
    Place,
    Move,
    Remove,
}

/// Final result of a game, serialized as `"win:1"`, `"win:2"` or `"draw"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Outcome {
    Win(Slot),
    Draw,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win(slot) => write!(f, "win:{slot}"),
            Outcome::Draw => write!(f, "draw"),
        }
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> String {
        outcome.to_string()
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draw" => Ok(Outcome::Draw),
            "win:1" => Ok(Outcome::Win(Slot::Host)),
            "win:2" => Ok(Outcome::Win(Slot::Guest)),
            other => Err(format!("invalid outcome: '{other}'")),
        }
    }
}

impl TryFrom<String> for Outcome {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Error kinds surfaced to the originating connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Full,
    NotYourTurn,
    InvalidState,
    AlreadyInRoom,
    BadRequest,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Full => "Full",
            ErrorKind::NotYourTurn => "NotYourTurn",
            ErrorKind::InvalidState => "InvalidState",
            ErrorKind::AlreadyInRoom => "AlreadyInRoom",
            ErrorKind::BadRequest => "BadRequest",
        };
        f.write_str(name)
    }
}

/// Per-slot piece bookkeeping, indexed by [`Slot::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceCounters {
    /// Pieces each slot still has to place.
    pub to_place: [u8; 2],
    /// Pieces each slot currently has on the board.
    pub placed: [u8; 2],
}

/// Events a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Register this connection under a display name.
    Identify {
        display_name: String,
        #[serde(default)]
        account_id: Option<String>,
    },
    /// Enter the public FIFO matchmaking queue.
    FindPublicGame,
    /// Create an invite-only room and receive its access code.
    CreatePrivateRoom {
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        max_slots: Option<u8>,
    },
    /// Join a private room by access code.
    JoinPrivateRoom {
        access_code: AccessCode,
        #[serde(default)]
        password: Option<String>,
    },
    /// Apply a move in the current room.
    MakeMove {
        action: MoveAction,
        position: u8,
        /// Source cell for `move` actions.
        #[serde(default)]
        from: Option<u8>,
        /// Optional client-asserted board snapshot adopted before the
        /// action is applied.
        #[serde(default)]
        board: Option<Board>,
    },
    /// Send a chat line to the current room.
    ChatMessage { text: String },
    /// Report the final outcome of the current room's game.
    GameOver { outcome: Outcome },
    /// Leave the current room without disconnecting.
    LeaveRoom,
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Acknowledges `identify`.
    NameSet { name: String },
    /// Waiting in the public queue at the given 1-based position.
    QueueJoined { position: usize },
    /// A private room was created; share the code to invite an opponent.
    RoomCreated { code: AccessCode },
    /// Both slots are filled and the game begins.
    GameStart {
        room_id: RoomId,
        your_slot: Slot,
        opponent: String,
        board: Board,
        turn: Slot,
    },
    /// A move was accepted; the authoritative room state after it.
    MoveMade {
        board: Board,
        turn: Slot,
        phase: Phase,
        counters: PieceCounters,
    },
    /// A chat line, stamped with a server timestamp and message id.
    ChatMessage {
        id: Uuid,
        sender: String,
        text: String,
        ts: i64,
    },
    /// The opponent's connection dropped; the room is gone.
    OpponentDisconnected,
    /// The opponent left the room explicitly; the room is gone.
    PlayerLeft,
    /// The game reached a final outcome.
    GameEnded { outcome: Outcome, duration_ms: i64 },
    /// An error scoped to the requesting connection.
    Error { kind: ErrorKind, message: String },
}

impl ServerEvent {
    /// Build an `error` frame from a kind and message.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_parses_without_account_id() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"identify","display_name":"Alice"}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::Identify {
                display_name: "Alice".to_string(),
                account_id: None,
            }
        );
    }

    #[test]
    fn test_make_move_parses_place_action() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"make_move","action":"place","position":7}"#).unwrap();
        match event {
            ClientEvent::MakeMove {
                action,
                position,
                from,
                board,
            } => {
                assert_eq!(action, MoveAction::Place);
                assert_eq!(position, 7);
                assert_eq!(from, None);
                assert!(board.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let result = serde_json::from_str::<ClientEvent>(r#"{"type":"launch_missiles"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_error_kind_serializes_as_pascal_case() {
        let json = serde_json::to_string(&ServerEvent::error(ErrorKind::NotYourTurn, "wait"))
            .unwrap();
        assert!(json.contains(r#""kind":"NotYourTurn""#), "got: {json}");
    }

    #[test]
    fn test_slot_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Slot::Host).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Slot::Guest).unwrap(), "2");
        assert_eq!(serde_json::from_str::<Slot>("2").unwrap(), Slot::Guest);
        assert!(serde_json::from_str::<Slot>("3").is_err());
    }

    #[test]
    fn test_outcome_wire_format() {
        assert_eq!(
            serde_json::to_string(&Outcome::Win(Slot::Guest)).unwrap(),
            r#""win:2""#
        );
        assert_eq!(
            serde_json::from_str::<Outcome>(r#""draw""#).unwrap(),
            Outcome::Draw
        );
        assert!(serde_json::from_str::<Outcome>(r#""win:3""#).is_err());
    }

    #[test]
    fn test_game_start_round_trips_board() {
        let mut board = empty_board();
        board[0] = Some(Slot::Host);
        let event = ServerEvent::GameStart {
            room_id: RoomId::new(),
            your_slot: Slot::Guest,
            opponent: "Alice".to_string(),
            board,
            turn: Slot::Host,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"game_start""#));
        let parsed: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
