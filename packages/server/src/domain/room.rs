//! Room: the state machine for one paired game session.
//!
//! A room moves `Waiting -> Active -> Finished`, or drops out of either
//! non-terminal state into `Cancelled` when a participant leaves. All
//! mutation goes through the coordinator, which serializes access with a
//! per-room lock; nothing here is aware of the transport.

use merels_shared::protocol::{
    AccessCode, Board, MoveAction, Outcome, Phase, PieceCounters, RoomId, Slot, empty_board,
};
use serde::Serialize;
use uuid::Uuid;

use super::error::GameError;
use super::registry::ConnectionId;

/// Room lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// One participant, waiting for an opponent.
    Waiting,
    /// Two participants, game in progress.
    Active,
    /// Terminal: outcome recorded.
    Finished,
    /// Non-terminal removal: a participant left before any result.
    Cancelled,
}

/// Whether a room is joinable through the public queue or by invite code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// One occupied participant slot.
#[derive(Debug, Clone)]
pub struct Seat {
    pub conn: ConnectionId,
    pub display_name: String,
    pub account_id: Option<String>,
    pub slot: Slot,
}

impl Seat {
    pub fn new(
        conn: ConnectionId,
        display_name: String,
        account_id: Option<String>,
        slot: Slot,
    ) -> Self {
        Self {
            conn,
            display_name,
            account_id,
            slot,
        }
    }
}

/// One chat line in the append-only transcript.
#[derive(Debug, Clone, Serialize)]
pub struct ChatEntry {
    pub id: Uuid,
    pub sender: String,
    pub text: String,
    pub ts: i64,
}

/// The authoritative state reported after an accepted move.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub board: Board,
    pub turn: Slot,
    pub phase: Phase,
    pub counters: PieceCounters,
}

/// Snapshot taken when a room finishes, fed to the persistence gateway.
#[derive(Debug, Clone)]
pub struct GameSummary {
    pub outcome: Outcome,
    pub duration_ms: i64,
    pub move_count: u32,
}

/// One paired game session and its mutable state.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    visibility: Visibility,
    code: Option<AccessCode>,
    password: Option<String>,
    seats: Vec<Seat>,
    status: RoomStatus,
    board: Board,
    turn: Slot,
    phase: Phase,
    to_place: [u8; 2],
    placed: [u8; 2],
    starting_pieces: u8,
    chat: Vec<ChatEntry>,
    move_count: u32,
    created_at: i64,
    started_at: Option<i64>,
}

impl Room {
    /// A private room with only the host seated, waiting for a joiner.
    pub fn private(
        id: RoomId,
        host: Seat,
        code: AccessCode,
        password: Option<String>,
        starting_pieces: u8,
        now: i64,
    ) -> Self {
        Self {
            id,
            visibility: Visibility::Private,
            code: Some(code),
            password,
            seats: vec![host],
            status: RoomStatus::Waiting,
            board: empty_board(),
            turn: Slot::Host,
            phase: Phase::Placing,
            to_place: [starting_pieces; 2],
            placed: [0; 2],
            starting_pieces,
            chat: Vec::new(),
            move_count: 0,
            created_at: now,
            started_at: None,
        }
    }

    /// A public room created from a matchmaker pairing; starts active.
    pub fn paired(id: RoomId, host: Seat, guest: Seat, starting_pieces: u8, now: i64) -> Self {
        let mut room = Self {
            id,
            visibility: Visibility::Public,
            code: None,
            password: None,
            seats: vec![host],
            status: RoomStatus::Waiting,
            board: empty_board(),
            turn: Slot::Host,
            phase: Phase::Placing,
            to_place: [starting_pieces; 2],
            placed: [0; 2],
            starting_pieces,
            chat: Vec::new(),
            move_count: 0,
            created_at: now,
            started_at: None,
        };
        room.seats.push(guest);
        room.start(now);
        room
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn code(&self) -> Option<&AccessCode> {
        self.code.as_ref()
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> Slot {
        self.turn
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn counters(&self) -> PieceCounters {
        PieceCounters {
            to_place: self.to_place,
            placed: self.placed,
        }
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn chat(&self) -> &[ChatEntry] {
        &self.chat
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    /// The seat occupied by this connection, if any.
    pub fn seat_of(&self, conn: ConnectionId) -> Option<&Seat> {
        self.seats.iter().find(|s| s.conn == conn)
    }

    /// The other seat, from this connection's point of view.
    pub fn opponent_of(&self, conn: ConnectionId) -> Option<&Seat> {
        self.seats.iter().find(|s| s.conn != conn)
    }

    /// Connection ids of every seated participant, broadcast targets.
    pub fn participants(&self) -> Vec<ConnectionId> {
        self.seats.iter().map(|s| s.conn).collect()
    }

    /// Check a join attempt's password against the room's, if it has one.
    pub fn check_password(&self, supplied: Option<&str>) -> Result<(), GameError> {
        match &self.password {
            None => Ok(()),
            Some(expected) if supplied == Some(expected.as_str()) => Ok(()),
            Some(_) => Err(GameError::Unauthorized("invalid password".to_string())),
        }
    }

    /// Fill the guest slot and activate the room.
    pub fn seat_guest(&mut self, guest: Seat, now: i64) -> Result<(), GameError> {
        // Capacity before status: a room with both slots taken answers
        // Full regardless of whether its game already started.
        if self.seats.len() >= 2 {
            return Err(GameError::Full);
        }
        if self.status != RoomStatus::Waiting {
            return Err(GameError::InvalidState(format!(
                "room is not joinable in state {:?}",
                self.status
            )));
        }
        self.seats.push(guest);
        self.start(now);
        Ok(())
    }

    /// `Waiting -> Active`: reset the board, counters and turn the instant
    /// the second slot fills.
    fn start(&mut self, now: i64) {
        debug_assert_eq!(self.seats.len(), 2);
        self.status = RoomStatus::Active;
        self.board = empty_board();
        self.turn = Slot::Host;
        self.phase = Phase::Placing;
        self.to_place = [self.starting_pieces; 2];
        self.placed = [0; 2];
        self.started_at = Some(now);
    }

    /// Apply a move from the given connection.
    ///
    /// Only turn ownership and room state are validated here; move
    /// legality (adjacency, mills, flying eligibility) belongs to a rules
    /// engine this server delegates to the clients. An accepted move flips
    /// the turn exactly once.
    pub fn apply_move(
        &mut self,
        conn: ConnectionId,
        action: MoveAction,
        position: u8,
        from: Option<u8>,
        asserted_board: Option<Board>,
    ) -> Result<MoveOutcome, GameError> {
        if self.status != RoomStatus::Active {
            return Err(GameError::InvalidState(format!(
                "room is not active ({:?})",
                self.status
            )));
        }
        let slot = self
            .seat_of(conn)
            .map(|s| s.slot)
            .ok_or_else(|| GameError::NotFound("not seated in this room".to_string()))?;
        if slot != self.turn {
            return Err(GameError::NotYourTurn);
        }
        let position = usize::from(position);
        if position >= self.board.len() {
            return Err(GameError::BadRequest(format!(
                "position {position} out of range"
            )));
        }

        // Clients carrying the authoritative rules engine may assert the
        // full board; adopt it before applying the action.
        if let Some(board) = asserted_board {
            self.board = board;
        }

        match action {
            MoveAction::Place => {
                if self.board[position].is_some() {
                    return Err(GameError::BadRequest(format!(
                        "cell {position} is occupied"
                    )));
                }
                if self.to_place[slot.index()] == 0 {
                    return Err(GameError::InvalidState(
                        "no pieces left to place".to_string(),
                    ));
                }
                self.board[position] = Some(slot);
                self.to_place[slot.index()] -= 1;
                self.placed[slot.index()] += 1;
            }
            MoveAction::Move => {
                let from = usize::from(from.ok_or_else(|| {
                    GameError::BadRequest("move action requires a source cell".to_string())
                })?);
                if from >= self.board.len() {
                    return Err(GameError::BadRequest(format!(
                        "source cell {from} out of range"
                    )));
                }
                if self.board[from] != Some(slot) {
                    return Err(GameError::BadRequest(format!(
                        "cell {from} does not hold your piece"
                    )));
                }
                if self.board[position].is_some() {
                    return Err(GameError::BadRequest(format!(
                        "cell {position} is occupied"
                    )));
                }
                self.board[from] = None;
                self.board[position] = Some(slot);
            }
            MoveAction::Remove => {
                let victim = slot.other();
                if self.board[position] != Some(victim) {
                    return Err(GameError::BadRequest(format!(
                        "cell {position} does not hold an opponent piece"
                    )));
                }
                self.board[position] = None;
                self.placed[victim.index()] = self.placed[victim.index()].saturating_sub(1);
            }
        }

        self.phase = self.recompute_phase();
        self.turn = self.turn.other();
        self.move_count += 1;

        Ok(MoveOutcome {
            board: self.board,
            turn: self.turn,
            phase: self.phase,
            counters: self.counters(),
        })
    }

    /// Phase transitions are driven by piece counts: placing until both
    /// sides have dropped their pieces, then moving, then flying once a
    /// side is down to three. `Removing` is asserted by the rules engine
    /// through board snapshots, never entered here.
    fn recompute_phase(&self) -> Phase {
        if self.to_place.iter().any(|&n| n > 0) {
            Phase::Placing
        } else if self.placed.iter().any(|&n| n <= 3) {
            Phase::Flying
        } else {
            Phase::Moving
        }
    }

    /// Append a chat line; the transcript is append-only and survives for
    /// the life of the room.
    pub fn append_chat(&mut self, entry: ChatEntry) {
        self.chat.push(entry);
    }

    /// `Active -> Finished`: record the outcome and end timestamp.
    pub fn finish(&mut self, outcome: Outcome, now: i64) -> Result<GameSummary, GameError> {
        if self.status != RoomStatus::Active {
            return Err(GameError::InvalidState(format!(
                "cannot finish a room in state {:?}",
                self.status
            )));
        }
        self.status = RoomStatus::Finished;
        let duration_ms = now - self.started_at.unwrap_or(self.created_at);
        Ok(GameSummary {
            outcome,
            duration_ms,
            move_count: self.move_count,
        })
    }

    /// `Active|Waiting -> Cancelled`: a participant is gone before any
    /// result. Idempotent; terminal states are left untouched.
    pub fn cancel(&mut self) {
        if matches!(self.status, RoomStatus::Waiting | RoomStatus::Active) {
            self.status = RoomStatus::Cancelled;
        }
    }
}
