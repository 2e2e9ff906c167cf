//! Connection registry: maps live connections to player identity and
//! current room association.

use std::collections::HashMap;
use std::fmt;

use merels_shared::protocol::RoomId;
use uuid::Uuid;

/// Ephemeral identifier of one live WebSocket connection, assigned by the
/// server at upgrade time. A reconnecting client gets a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A connected, identified participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub display_name: String,
    /// Durable account identifier, if the client provided one.
    pub account_id: Option<String>,
    /// The room this player currently sits in, if any.
    pub room: Option<RoomId>,
}

/// Registry of identified connections.
///
/// Display names are not unique across connections; two tabs can both
/// identify as "Alice".
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    players: HashMap<ConnectionId, Player>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite the entry for a connection. Re-identifying
    /// resets the room association.
    pub fn register(
        &mut self,
        conn: ConnectionId,
        display_name: String,
        account_id: Option<String>,
    ) -> &Player {
        self.players.insert(
            conn,
            Player {
                display_name,
                account_id,
                room: None,
            },
        );
        &self.players[&conn]
    }

    pub fn lookup(&self, conn: ConnectionId) -> Option<&Player> {
        self.players.get(&conn)
    }

    /// Point a player at a room, or clear the association with `None`.
    /// No-op for unknown connections.
    pub fn set_room(&mut self, conn: ConnectionId, room: Option<RoomId>) {
        if let Some(player) = self.players.get_mut(&conn) {
            player.room = room;
        }
    }

    /// Remove the entry at disconnect. Silently a no-op if absent.
    pub fn remove(&mut self, conn: ConnectionId) {
        self.players.remove(&conn);
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ConnectionRegistry::new();
        let conn = ConnectionId::new();

        registry.register(conn, "Alice".to_string(), Some("acct-1".to_string()));

        let player = registry.lookup(conn).unwrap();
        assert_eq!(player.display_name, "Alice");
        assert_eq!(player.account_id.as_deref(), Some("acct-1"));
        assert_eq!(player.room, None);
    }

    #[test]
    fn test_register_overwrites_existing_entry() {
        let mut registry = ConnectionRegistry::new();
        let conn = ConnectionId::new();

        registry.register(conn, "Alice".to_string(), None);
        registry.set_room(conn, Some(RoomId::new()));
        registry.register(conn, "Alicia".to_string(), None);

        let player = registry.lookup(conn).unwrap();
        assert_eq!(player.display_name, "Alicia");
        assert_eq!(player.room, None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_display_names_need_not_be_unique() {
        let mut registry = ConnectionRegistry::new();
        registry.register(ConnectionId::new(), "Alice".to_string(), None);
        registry.register(ConnectionId::new(), "Alice".to_string(), None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_set_room_and_clear() {
        let mut registry = ConnectionRegistry::new();
        let conn = ConnectionId::new();
        let room = RoomId::new();

        registry.register(conn, "Bob".to_string(), None);
        registry.set_room(conn, Some(room));
        assert_eq!(registry.lookup(conn).unwrap().room, Some(room));

        registry.set_room(conn, None);
        assert_eq!(registry.lookup(conn).unwrap().room, None);
    }

    #[test]
    fn test_remove_is_silent_for_unknown_connection() {
        let mut registry = ConnectionRegistry::new();
        registry.remove(ConnectionId::new());
        assert!(registry.is_empty());
    }
}
