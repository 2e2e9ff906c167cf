//! Persistence gateway: best-effort recording of finished games.
//!
//! The coordinator sends a [`GameResultRecord`] down an unbounded channel
//! and moves on; a spawned recorder task owns the actual store call.
//! Failures are logged and dropped, never retried here and never surfaced
//! to clients. In-memory state stays authoritative for the live session
//! regardless of durability outcome.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use merels_shared::protocol::{Outcome, RoomId, Slot};

/// One participant in a finished game.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantRecord {
    pub display_name: String,
    pub account_id: Option<String>,
    pub slot: Slot,
}

/// Durable record of one session outcome.
///
/// `game_id` is generated by the core and makes the record idempotent on
/// the store side.
#[derive(Debug, Clone, Serialize)]
pub struct GameResultRecord {
    pub game_id: Uuid,
    pub room_id: RoomId,
    pub participants: Vec<ParticipantRecord>,
    pub outcome: Outcome,
    pub duration_ms: i64,
    pub move_count: u32,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(String),
    #[error("store rejected record: status {0}")]
    Status(u16),
}

/// Where finished games end up.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn record(&self, record: &GameResultRecord) -> Result<(), StoreError>;
}

/// POSTs result records as JSON to an HTTP endpoint.
pub struct HttpResultStore {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpResultStore {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ResultStore for HttpResultStore {
    async fn record(&self, record: &GameResultRecord) -> Result<(), StoreError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StoreError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Store used when no endpoint is configured; results are log-only.
pub struct NullResultStore;

#[async_trait]
impl ResultStore for NullResultStore {
    async fn record(&self, record: &GameResultRecord) -> Result<(), StoreError> {
        tracing::debug!(
            "no result endpoint configured, dropping record for game {}",
            record.game_id
        );
        Ok(())
    }
}

/// Spawn the recorder task and return the channel the coordinator writes
/// to. The task runs until every sender is dropped.
pub fn spawn_recorder(store: Arc<dyn ResultStore>) -> mpsc::UnboundedSender<GameResultRecord> {
    let (tx, mut rx) = mpsc::unbounded_channel::<GameResultRecord>();
    tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            let game_id = record.game_id;
            match store.record(&record).await {
                Ok(()) => tracing::info!("recorded game result {}", game_id),
                Err(e) => tracing::warn!("failed to record game result {}: {}", game_id, e),
            }
        }
        tracing::debug!("result recorder shutting down");
    });
    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    /// Store that remembers every record it sees.
    struct MemoryStore {
        records: Mutex<Vec<GameResultRecord>>,
    }

    #[async_trait]
    impl ResultStore for MemoryStore {
        async fn record(&self, record: &GameResultRecord) -> Result<(), StoreError> {
            self.records.lock().await.push(record.clone());
            Ok(())
        }
    }

    /// Store that always fails, to prove failures stay contained.
    struct FailingStore;

    #[async_trait]
    impl ResultStore for FailingStore {
        async fn record(&self, _record: &GameResultRecord) -> Result<(), StoreError> {
            Err(StoreError::Status(500))
        }
    }

    fn sample_record() -> GameResultRecord {
        GameResultRecord {
            game_id: Uuid::new_v4(),
            room_id: RoomId::new(),
            participants: vec![ParticipantRecord {
                display_name: "Alice".to_string(),
                account_id: None,
                slot: Slot::Host,
            }],
            outcome: Outcome::Win(Slot::Host),
            duration_ms: 60_000,
            move_count: 18,
        }
    }

    #[tokio::test]
    async fn test_recorder_forwards_records_to_store() {
        let store = Arc::new(MemoryStore {
            records: Mutex::new(Vec::new()),
        });
        let tx = spawn_recorder(store.clone());

        let record = sample_record();
        tx.send(record.clone()).unwrap();

        // Give the recorder task a chance to drain the channel.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let seen = store.records.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].game_id, record.game_id);
    }

    #[tokio::test]
    async fn test_store_failure_does_not_kill_recorder() {
        let tx = spawn_recorder(Arc::new(FailingStore));
        tx.send(sample_record()).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        // Channel is still open and accepting records.
        assert!(tx.send(sample_record()).is_ok());
    }
}
