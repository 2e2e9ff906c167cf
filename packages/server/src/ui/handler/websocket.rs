//! WebSocket connection handler.
//!
//! Each upgraded socket gets a server-assigned [`ConnectionId`], an
//! outbox channel for outbound frames, and two tasks: one pushing queued
//! frames out, one reading client frames and dispatching them to the
//! coordinator. When either side closes, the other task is aborted and
//! disconnect cleanup runs to completion.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use merels_shared::protocol::{ClientEvent, ErrorKind, ServerEvent};

use crate::domain::ConnectionId;
use crate::outbox::Outbox;
use crate::ui::state::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let conn = ConnectionId::new();
    tracing::info!("connection '{}' upgrading", conn);
    ws.on_upgrade(move |socket| handle_socket(socket, state, conn))
}

/// Forwards queued outbound frames to the socket until either side closes.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, conn: ConnectionId) {
    let (sender, mut receiver) = socket.split();

    let (tx, rx) = mpsc::unbounded_channel();
    state.outbox.register(conn, tx).await;

    let mut send_task = pusher_loop(rx, sender);

    let coordinator = state.coordinator.clone();
    let outbox = state.outbox.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!("websocket error on '{}': {}", conn, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    // Validate at the boundary: anything that does not
                    // parse as a tagged client event is answered with a
                    // BadRequest error, never dispatched.
                    match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            tracing::debug!("event from '{}': {:?}", conn, event);
                            coordinator.dispatch(conn, event).await;
                        }
                        Err(e) => {
                            tracing::warn!("malformed frame from '{}': {}", conn, e);
                            outbox
                                .send(
                                    conn,
                                    &ServerEvent::error(
                                        ErrorKind::BadRequest,
                                        format!("malformed event: {e}"),
                                    ),
                                )
                                .await;
                        }
                    }
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // Keepalive is handled by the protocol layer.
                }
                Message::Close(_) => {
                    tracing::info!("connection '{}' requested close", conn);
                    break;
                }
                _ => {}
            }
        }
    });

    // Whichever task finishes first takes the other down with it.
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.coordinator.handle_disconnect(conn).await;
    state.outbox.unregister(conn).await;
    tracing::info!("connection '{}' closed", conn);
}
