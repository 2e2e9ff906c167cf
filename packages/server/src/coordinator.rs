//! Session coordinator: owns the connection registry, the room table and
//! the matchmaker, and is the only code that mutates any of them.
//!
//! Inbound client events are dispatched here, resolved to a player and a
//! room, run through the room's state machine, and answered with
//! broadcasts through the [`Outbox`]. The registry and matchmaker sit
//! behind their own mutexes (low contention, O(1) operations); each room
//! has its own lock so distinct rooms make progress in parallel while a
//! single room's mutations stay serialized. Persistence is a channel send
//! and never blocks a broadcast.

use std::collections::HashMap;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use merels_shared::protocol::{
    AccessCode, Board, ClientEvent, MoveAction, Outcome, RoomId, ServerEvent, Slot,
};
use merels_shared::time::{Clock, SystemClock, timestamp_to_rfc3339};

use crate::config::ServerConfig;
use crate::domain::{
    ConnectionId, ConnectionRegistry, Enqueue, GameError, Matchmaker, Player, Room, RoomStatus,
    Seat, Visibility,
};
use crate::gateway::{GameResultRecord, ParticipantRecord};
use crate::outbox::Outbox;

/// Counters exposed on the health endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CoordinatorStats {
    pub connected_players: usize,
    pub active_rooms: usize,
    pub waiting_players: usize,
    pub open_invites: usize,
    /// How long the head of the public queue has been waiting, if anyone is.
    pub longest_wait_ms: Option<i64>,
}

/// One row of the room listing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub status: RoomStatus,
    pub visibility: Visibility,
    pub participants: Vec<String>,
    pub created_at: String,
}

/// The server core. Constructed once at process start and injected into
/// the transport layer; there is no ambient global state.
pub struct Coordinator {
    config: ServerConfig,
    clock: Arc<dyn Clock>,
    registry: Mutex<ConnectionRegistry>,
    matchmaker: Mutex<Matchmaker>,
    rooms: Mutex<HashMap<RoomId, Arc<Mutex<Room>>>>,
    outbox: Arc<dyn Outbox>,
    results: mpsc::UnboundedSender<GameResultRecord>,
}

impl Coordinator {
    pub fn new(
        config: ServerConfig,
        outbox: Arc<dyn Outbox>,
        results: mpsc::UnboundedSender<GameResultRecord>,
    ) -> Arc<Self> {
        Self::with_clock(config, outbox, results, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: ServerConfig,
        outbox: Arc<dyn Outbox>,
        results: mpsc::UnboundedSender<GameResultRecord>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            clock,
            registry: Mutex::new(ConnectionRegistry::new()),
            matchmaker: Mutex::new(Matchmaker::new(StdRng::from_entropy())),
            rooms: Mutex::new(HashMap::new()),
            outbox,
            results,
        })
    }

    /// Dispatch one inbound event. Domain errors are answered to the
    /// originating connection only and never escape this boundary.
    pub async fn dispatch(self: &Arc<Self>, conn: ConnectionId, event: ClientEvent) {
        let result = match event {
            ClientEvent::Identify {
                display_name,
                account_id,
            } => self.handle_identify(conn, display_name, account_id).await,
            ClientEvent::FindPublicGame => self.handle_find_public_game(conn).await,
            ClientEvent::CreatePrivateRoom {
                password,
                max_slots,
            } => self.handle_create_private(conn, password, max_slots).await,
            ClientEvent::JoinPrivateRoom {
                access_code,
                password,
            } => self.handle_join_private(conn, access_code, password).await,
            ClientEvent::MakeMove {
                action,
                position,
                from,
                board,
            } => self.handle_move(conn, action, position, from, board).await,
            ClientEvent::ChatMessage { text } => self.handle_chat(conn, text).await,
            ClientEvent::GameOver { outcome } => self.handle_game_over(conn, outcome).await,
            ClientEvent::LeaveRoom => {
                self.handle_leave(conn).await;
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::debug!("event from '{}' rejected: {}", conn, e);
            self.outbox
                .send(conn, &ServerEvent::error(e.kind(), e.to_string()))
                .await;
        }
    }

    pub async fn handle_identify(
        &self,
        conn: ConnectionId,
        display_name: String,
        account_id: Option<String>,
    ) -> Result<(), GameError> {
        if display_name.trim().is_empty() {
            return Err(GameError::BadRequest(
                "display name must not be empty".to_string(),
            ));
        }
        {
            let mut registry = self.registry.lock().await;
            registry.register(conn, display_name.clone(), account_id);
        }
        tracing::info!("connection '{}' identified as '{}'", conn, display_name);
        self.outbox
            .send(conn, &ServerEvent::NameSet { name: display_name })
            .await;
        Ok(())
    }

    pub async fn handle_find_public_game(self: &Arc<Self>, conn: ConnectionId) -> Result<(), GameError> {
        let player = self.resolve_player(conn).await?;
        if player.room.is_some() {
            return Err(GameError::AlreadyInRoom);
        }

        let now = self.clock.now_millis();
        let paired = {
            let mut matchmaker = self.matchmaker.lock().await;
            matchmaker.enqueue_public(conn, now)
        };

        match paired {
            Enqueue::Queued { position } => {
                tracing::info!("'{}' waiting in public queue at position {}", conn, position);
                self.outbox
                    .send(conn, &ServerEvent::QueueJoined { position })
                    .await;
            }
            Enqueue::Paired { host, guest } => {
                self.start_public_room(host, guest).await?;
            }
        }
        Ok(())
    }

    /// Pair two dequeued connections into a fresh active room.
    async fn start_public_room(
        &self,
        host: ConnectionId,
        guest: ConnectionId,
    ) -> Result<(), GameError> {
        let (host_player, guest_player) = {
            let registry = self.registry.lock().await;
            (
                registry.lookup(host).cloned(),
                registry.lookup(guest).cloned(),
            )
        };
        // Disconnects cancel queue entries, so both should resolve; if one
        // slipped through, put the survivor back at the front of the line.
        let (host_player, guest_player) = match (host_player, guest_player) {
            (Some(h), Some(g)) => (h, g),
            _ => {
                tracing::warn!("pairing raced a disconnect, re-queueing survivor");
                let now = self.clock.now_millis();
                for conn in [host, guest] {
                    let known = { self.registry.lock().await.lookup(conn).is_some() };
                    if known {
                        let position = {
                            let mut matchmaker = self.matchmaker.lock().await;
                            matchmaker.requeue_front(conn, now)
                        };
                        self.outbox
                            .send(conn, &ServerEvent::QueueJoined { position })
                            .await;
                    }
                }
                return Ok(());
            }
        };

        let now = self.clock.now_millis();
        let room_id = RoomId::new();
        let room = Room::paired(
            room_id,
            Seat::new(
                host,
                host_player.display_name.clone(),
                host_player.account_id.clone(),
                Slot::Host,
            ),
            Seat::new(
                guest,
                guest_player.display_name.clone(),
                guest_player.account_id.clone(),
                Slot::Guest,
            ),
            self.config.starting_pieces,
            now,
        );

        let starts = Self::game_start_events(&room);
        {
            let mut rooms = self.rooms.lock().await;
            rooms.insert(room_id, Arc::new(Mutex::new(room)));
        }
        {
            let mut registry = self.registry.lock().await;
            registry.set_room(host, Some(room_id));
            registry.set_room(guest, Some(room_id));
        }

        tracing::info!(
            "public room {} started: '{}' vs '{}'",
            room_id,
            host_player.display_name,
            guest_player.display_name
        );
        for (conn, event) in starts {
            self.outbox.send(conn, &event).await;
        }
        Ok(())
    }

    pub async fn handle_create_private(
        &self,
        conn: ConnectionId,
        password: Option<String>,
        max_slots: Option<u8>,
    ) -> Result<(), GameError> {
        let player = self.resolve_player(conn).await?;
        if player.room.is_some() {
            return Err(GameError::AlreadyInRoom);
        }
        if let Some(slots) = max_slots {
            if slots != 2 {
                return Err(GameError::BadRequest(
                    "only two-player rooms are supported".to_string(),
                ));
            }
        }

        let room_id = RoomId::new();
        let code = {
            let mut matchmaker = self.matchmaker.lock().await;
            matchmaker.register_invite(room_id)
        };
        let room = Room::private(
            room_id,
            Seat::new(conn, player.display_name, player.account_id, Slot::Host),
            code.clone(),
            password,
            self.config.starting_pieces,
            self.clock.now_millis(),
        );
        {
            let mut rooms = self.rooms.lock().await;
            rooms.insert(room_id, Arc::new(Mutex::new(room)));
        }
        {
            let mut registry = self.registry.lock().await;
            registry.set_room(conn, Some(room_id));
        }

        tracing::info!("private room {} created with code {}", room_id, code);
        self.outbox
            .send(conn, &ServerEvent::RoomCreated { code })
            .await;
        Ok(())
    }

    pub async fn handle_join_private(
        &self,
        conn: ConnectionId,
        code: AccessCode,
        password: Option<String>,
    ) -> Result<(), GameError> {
        let player = self.resolve_player(conn).await?;
        if player.room.is_some() {
            return Err(GameError::AlreadyInRoom);
        }

        let (room_id, open) = {
            let matchmaker = self.matchmaker.lock().await;
            matchmaker
                .resolve(&code)
                .ok_or_else(|| GameError::NotFound(format!("no room for code {code}")))?
        };
        let room_arc = self
            .room_arc(room_id)
            .await
            .ok_or_else(|| GameError::NotFound(format!("no room for code {code}")))?;

        let starts = {
            let mut room = room_arc.lock().await;
            room.check_password(password.as_deref())?;
            if !open {
                return Err(GameError::Full);
            }
            room.seat_guest(
                Seat::new(conn, player.display_name, player.account_id, Slot::Guest),
                self.clock.now_millis(),
            )?;
            Self::game_start_events(&room)
        };

        {
            let mut matchmaker = self.matchmaker.lock().await;
            matchmaker.close_invite(&code);
        }
        {
            let mut registry = self.registry.lock().await;
            registry.set_room(conn, Some(room_id));
        }

        tracing::info!("'{}' joined private room {} via code {}", conn, room_id, code);
        for (target, event) in starts {
            self.outbox.send(target, &event).await;
        }
        Ok(())
    }

    pub async fn handle_move(
        &self,
        conn: ConnectionId,
        action: MoveAction,
        position: u8,
        from: Option<u8>,
        board: Option<Board>,
    ) -> Result<(), GameError> {
        let room_arc = self.resolve_room(conn).await?;
        let (outcome, targets) = {
            let mut room = room_arc.lock().await;
            let outcome = room.apply_move(conn, action, position, from, board)?;
            (outcome, room.participants())
        };

        // No echo suppression: the mover hears their own move back.
        self.outbox
            .broadcast(
                &targets,
                &ServerEvent::MoveMade {
                    board: outcome.board,
                    turn: outcome.turn,
                    phase: outcome.phase,
                    counters: outcome.counters,
                },
            )
            .await;
        Ok(())
    }

    pub async fn handle_chat(&self, conn: ConnectionId, text: String) -> Result<(), GameError> {
        let player = self.resolve_player(conn).await?;
        let room_arc = self.resolve_room(conn).await?;

        let entry = crate::domain::ChatEntry {
            id: Uuid::new_v4(),
            sender: player.display_name,
            text,
            ts: self.clock.now_millis(),
        };
        let (entry, targets) = {
            let mut room = room_arc.lock().await;
            room.append_chat(entry.clone());
            (entry, room.participants())
        };

        self.outbox
            .broadcast(
                &targets,
                &ServerEvent::ChatMessage {
                    id: entry.id,
                    sender: entry.sender,
                    text: entry.text,
                    ts: entry.ts,
                },
            )
            .await;
        Ok(())
    }

    pub async fn handle_game_over(
        self: &Arc<Self>,
        conn: ConnectionId,
        outcome: Outcome,
    ) -> Result<(), GameError> {
        let room_arc = self.resolve_room(conn).await?;
        let now = self.clock.now_millis();

        let (summary, room_id, code, seats, targets) = {
            let mut room = room_arc.lock().await;
            let summary = room.finish(outcome, now)?;
            (
                summary,
                room.id(),
                room.code().cloned(),
                room.seats().to_vec(),
                room.participants(),
            )
        };

        self.outbox
            .broadcast(
                &targets,
                &ServerEvent::GameEnded {
                    outcome: summary.outcome,
                    duration_ms: summary.duration_ms,
                },
            )
            .await;

        // Fire-and-forget: the recorder task owns the store call; a full
        // or closed channel is logged, never surfaced.
        let record = GameResultRecord {
            game_id: Uuid::new_v4(),
            room_id,
            participants: seats
                .iter()
                .map(|seat| ParticipantRecord {
                    display_name: seat.display_name.clone(),
                    account_id: seat.account_id.clone(),
                    slot: seat.slot,
                })
                .collect(),
            outcome: summary.outcome,
            duration_ms: summary.duration_ms,
            move_count: summary.move_count,
        };
        if self.results.send(record).is_err() {
            tracing::warn!("result recorder is gone, dropping record for room {}", room_id);
        }

        tracing::info!("room {} finished: {}", room_id, summary.outcome);
        self.remove_room(room_id, code, &targets).await;
        Ok(())
    }

    /// Explicit `leave_room`: the opponent sees `player_left`.
    pub async fn handle_leave(self: &Arc<Self>, conn: ConnectionId) {
        self.vacate_room(conn, ServerEvent::PlayerLeft).await;
    }

    /// Full disconnect cleanup. Always runs to completion: queue entry,
    /// room, registry entry all go.
    pub async fn handle_disconnect(self: &Arc<Self>, conn: ConnectionId) {
        {
            let mut matchmaker = self.matchmaker.lock().await;
            matchmaker.cancel(conn);
        }
        self.vacate_room(conn, ServerEvent::OpponentDisconnected)
            .await;
        {
            let mut registry = self.registry.lock().await;
            registry.remove(conn);
        }
        tracing::info!("connection '{}' cleaned up", conn);
    }

    /// Shared leave/disconnect path: notify the opponent, cancel the room
    /// and schedule its removal.
    async fn vacate_room(self: &Arc<Self>, conn: ConnectionId, notify: ServerEvent) {
        let room_id = {
            let registry = self.registry.lock().await;
            registry.lookup(conn).and_then(|p| p.room)
        };
        let Some(room_id) = room_id else {
            return;
        };
        let Some(room_arc) = self.room_arc(room_id).await else {
            let mut registry = self.registry.lock().await;
            registry.set_room(conn, None);
            return;
        };

        let (opponent, code, participants) = {
            let mut room = room_arc.lock().await;
            room.cancel();
            (
                room.opponent_of(conn).map(|seat| seat.conn),
                room.code().cloned(),
                room.participants(),
            )
        };

        if let Some(opponent) = opponent {
            self.outbox.send(opponent, &notify).await;
        }

        if self.config.disconnect_grace.is_zero() {
            self.remove_room(room_id, code, &participants).await;
        } else {
            // Opponent already notified; only the teardown is deferred.
            let coordinator = Arc::clone(self);
            let grace = self.config.disconnect_grace;
            let participants = participants.clone();
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                coordinator.remove_room(room_id, code, &participants).await;
            });
        }
    }

    /// Drop a room from the table, clear every participant's room
    /// reference and free its access code for reuse.
    async fn remove_room(
        &self,
        room_id: RoomId,
        code: Option<AccessCode>,
        participants: &[ConnectionId],
    ) {
        {
            let mut rooms = self.rooms.lock().await;
            rooms.remove(&room_id);
        }
        {
            let mut registry = self.registry.lock().await;
            for &conn in participants {
                registry.set_room(conn, None);
            }
        }
        if let Some(code) = code {
            let mut matchmaker = self.matchmaker.lock().await;
            matchmaker.release_code(&code);
        }
        tracing::debug!("room {} removed", room_id);
    }

    async fn resolve_player(&self, conn: ConnectionId) -> Result<Player, GameError> {
        let registry = self.registry.lock().await;
        registry
            .lookup(conn)
            .cloned()
            .ok_or_else(|| GameError::NotFound("connection has not identified".to_string()))
    }

    /// Resolve a connection to the room it sits in.
    async fn resolve_room(&self, conn: ConnectionId) -> Result<Arc<Mutex<Room>>, GameError> {
        let player = self.resolve_player(conn).await?;
        let room_id = player
            .room
            .ok_or_else(|| GameError::NotFound("not in a room".to_string()))?;
        self.room_arc(room_id)
            .await
            .ok_or_else(|| GameError::NotFound("room no longer exists".to_string()))
    }

    async fn room_arc(&self, room_id: RoomId) -> Option<Arc<Mutex<Room>>> {
        let rooms = self.rooms.lock().await;
        rooms.get(&room_id).cloned()
    }

    /// Per-seat `game_start` events: each participant learns their own
    /// slot and the opponent's name.
    fn game_start_events(room: &Room) -> Vec<(ConnectionId, ServerEvent)> {
        room.seats()
            .iter()
            .map(|seat| {
                let opponent = room
                    .seats()
                    .iter()
                    .find(|other| other.slot != seat.slot)
                    .map(|other| other.display_name.clone())
                    .unwrap_or_default();
                (
                    seat.conn,
                    ServerEvent::GameStart {
                        room_id: room.id(),
                        your_slot: seat.slot,
                        opponent,
                        board: *room.board(),
                        turn: room.turn(),
                    },
                )
            })
            .collect()
    }

    /// Counters for the health endpoint.
    pub async fn stats(&self) -> CoordinatorStats {
        let connected_players = self.registry.lock().await.len();
        let active_rooms = self.rooms.lock().await.len();
        let now = self.clock.now_millis();
        let matchmaker = self.matchmaker.lock().await;
        CoordinatorStats {
            connected_players,
            active_rooms,
            waiting_players: matchmaker.waiting(),
            open_invites: matchmaker.open_invites(),
            longest_wait_ms: matchmaker.oldest_waiting_since().map(|since| now - since),
        }
    }

    /// Snapshot of every live room for the listing endpoint.
    pub async fn room_summaries(&self) -> Vec<RoomSummary> {
        let rooms: Vec<Arc<Mutex<Room>>> = {
            let rooms = self.rooms.lock().await;
            rooms.values().cloned().collect()
        };
        let mut summaries = Vec::with_capacity(rooms.len());
        for room_arc in rooms {
            let room = room_arc.lock().await;
            summaries.push(RoomSummary {
                id: room.id(),
                status: room.status(),
                visibility: room.visibility(),
                participants: room
                    .seats()
                    .iter()
                    .map(|seat| seat.display_name.clone())
                    .collect(),
                created_at: timestamp_to_rfc3339(room.created_at()),
            });
        }
        summaries
    }
}
