//! Outbound event delivery.
//!
//! The coordinator never touches sockets; it hands [`ServerEvent`]s to an
//! [`Outbox`], and the WebSocket implementation forwards them through the
//! per-connection sender channels registered at upgrade time. Tests swap
//! in a recording implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use merels_shared::protocol::ServerEvent;

use crate::domain::ConnectionId;

/// Per-connection channel carrying serialized frames to the socket task.
pub type OutboundChannel = mpsc::UnboundedSender<String>;

/// Delivery seam between the coordinator and the transport.
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Attach a connection's sender channel.
    async fn register(&self, conn: ConnectionId, sender: OutboundChannel);

    /// Detach a connection's sender channel.
    async fn unregister(&self, conn: ConnectionId);

    /// Send one event to one connection. Delivery failures are logged,
    /// not propagated; a vanished client is not the coordinator's problem.
    async fn send(&self, conn: ConnectionId, event: &ServerEvent);

    /// Send one event to several connections, tolerating partial failure.
    async fn broadcast(&self, targets: &[ConnectionId], event: &ServerEvent);
}

/// WebSocket-backed outbox: a map of connection id to sender channel.
#[derive(Default)]
pub struct WebSocketOutbox {
    clients: Mutex<HashMap<ConnectionId, OutboundChannel>>,
}

impl WebSocketOutbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn serialize(event: &ServerEvent) -> Option<String> {
        match serde_json::to_string(event) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::error!("failed to serialize server event: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl Outbox for WebSocketOutbox {
    async fn register(&self, conn: ConnectionId, sender: OutboundChannel) {
        let mut clients = self.clients.lock().await;
        clients.insert(conn, sender);
        tracing::debug!("connection '{}' registered to outbox", conn);
    }

    async fn unregister(&self, conn: ConnectionId) {
        let mut clients = self.clients.lock().await;
        clients.remove(&conn);
        tracing::debug!("connection '{}' unregistered from outbox", conn);
    }

    async fn send(&self, conn: ConnectionId, event: &ServerEvent) {
        let Some(json) = Self::serialize(event) else {
            return;
        };
        let clients = self.clients.lock().await;
        match clients.get(&conn) {
            Some(sender) => {
                if sender.send(json).is_err() {
                    tracing::warn!("failed to push event to connection '{}'", conn);
                }
            }
            None => {
                tracing::warn!("connection '{}' not found in outbox, dropping event", conn);
            }
        }
    }

    async fn broadcast(&self, targets: &[ConnectionId], event: &ServerEvent) {
        let Some(json) = Self::serialize(event) else {
            return;
        };
        let clients = self.clients.lock().await;
        for target in targets {
            if let Some(sender) = clients.get(target) {
                if sender.send(json.clone()).is_err() {
                    tracing::warn!("failed to push event to connection '{}'", target);
                }
            } else {
                tracing::warn!("connection '{}' not found during broadcast, skipping", target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merels_shared::protocol::ErrorKind;

    #[tokio::test]
    async fn test_send_delivers_serialized_event() {
        let outbox = WebSocketOutbox::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::new();
        outbox.register(conn, tx).await;

        outbox
            .send(conn, &ServerEvent::NameSet {
                name: "Alice".to_string(),
            })
            .await;

        let frame = rx.recv().await.unwrap();
        assert!(frame.contains(r#""type":"name_set""#));
        assert!(frame.contains("Alice"));
    }

    #[tokio::test]
    async fn test_send_to_unknown_connection_is_dropped() {
        let outbox = WebSocketOutbox::new();
        // Only verifies this does not panic or block.
        outbox
            .send(
                ConnectionId::new(),
                &ServerEvent::error(ErrorKind::NotFound, "nobody home"),
            )
            .await;
    }

    #[tokio::test]
    async fn test_broadcast_tolerates_missing_target() {
        let outbox = WebSocketOutbox::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let present = ConnectionId::new();
        let absent = ConnectionId::new();
        outbox.register(present, tx).await;

        outbox
            .broadcast(&[present, absent], &ServerEvent::PlayerLeft)
            .await;

        let frame = rx.recv().await.unwrap();
        assert!(frame.contains(r#""type":"player_left""#));
    }

    #[tokio::test]
    async fn test_unregister_stops_delivery() {
        let outbox = WebSocketOutbox::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::new();
        outbox.register(conn, tx).await;
        outbox.unregister(conn).await;

        outbox.send(conn, &ServerEvent::OpponentDisconnected).await;
        // Sender side was dropped with the registration.
        assert!(rx.try_recv().is_err());
    }
}
