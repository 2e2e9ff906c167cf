//! End-to-end test over a real WebSocket connection.
//!
//! Boots the full router on an ephemeral port and drives two
//! tokio-tungstenite clients through a public matchmaking session.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use merels_server::config::ServerConfig;
use merels_server::ui::{build_router, build_state};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server() -> String {
    let state = build_state(ServerConfig::default());
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{addr}/ws")
}

async fn connect(url: &str) -> WsClient {
    let (ws, _response) = connect_async(url).await.expect("websocket handshake");
    ws
}

async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

/// Next text frame as JSON, skipping control frames.
async fn recv_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).expect("valid JSON frame"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn identify(ws: &mut WsClient, name: &str) {
    send_json(ws, json!({ "type": "identify", "display_name": name })).await;
    let reply = recv_json(ws).await;
    assert_eq!(reply["type"], "name_set");
    assert_eq!(reply["name"], name);
}

#[tokio::test]
async fn test_public_session_over_websocket() {
    let url = spawn_server().await;

    let mut alice = connect(&url).await;
    let mut bob = connect(&url).await;
    identify(&mut alice, "Alice").await;
    identify(&mut bob, "Bob").await;

    // Alice queues first and waits.
    send_json(&mut alice, json!({ "type": "find_public_game" })).await;
    let queued = recv_json(&mut alice).await;
    assert_eq!(queued["type"], "queue_joined");
    assert_eq!(queued["position"], 1);

    // Bob's arrival pairs them; both receive game_start.
    send_json(&mut bob, json!({ "type": "find_public_game" })).await;
    let alice_start = recv_json(&mut alice).await;
    let bob_start = recv_json(&mut bob).await;
    assert_eq!(alice_start["type"], "game_start");
    assert_eq!(alice_start["your_slot"], 1);
    assert_eq!(alice_start["opponent"], "Bob");
    assert_eq!(alice_start["turn"], 1);
    assert_eq!(alice_start["board"].as_array().unwrap().len(), 24);
    assert!(
        alice_start["board"]
            .as_array()
            .unwrap()
            .iter()
            .all(Value::is_null)
    );
    assert_eq!(bob_start["your_slot"], 2);
    assert_eq!(bob_start["opponent"], "Alice");
    assert_eq!(bob_start["room_id"], alice_start["room_id"]);

    // Bob is not on turn; only he hears about it.
    send_json(
        &mut bob,
        json!({ "type": "make_move", "action": "place", "position": 0 }),
    )
    .await;
    let rejected = recv_json(&mut bob).await;
    assert_eq!(rejected["type"], "error");
    assert_eq!(rejected["kind"], "NotYourTurn");

    // Alice's placement reaches both with the flipped turn.
    send_json(
        &mut alice,
        json!({ "type": "make_move", "action": "place", "position": 0 }),
    )
    .await;
    for ws in [&mut alice, &mut bob] {
        let made = recv_json(ws).await;
        assert_eq!(made["type"], "move_made");
        assert_eq!(made["board"][0], 1);
        assert_eq!(made["turn"], 2);
        assert_eq!(made["phase"], "placing");
    }

    // Bob drops; Alice learns the room is gone.
    drop(bob);
    let gone = recv_json(&mut alice).await;
    assert_eq!(gone["type"], "opponent_disconnected");

    // Further moves bounce off the removed room. The teardown may still
    // be in flight, so either rejection kind is fine.
    send_json(
        &mut alice,
        json!({ "type": "make_move", "action": "place", "position": 1 }),
    )
    .await;
    let stale = recv_json(&mut alice).await;
    assert_eq!(stale["type"], "error");
    assert!(
        stale["kind"] == "NotFound" || stale["kind"] == "InvalidState",
        "got: {stale}"
    );
}

#[tokio::test]
async fn test_malformed_frame_gets_bad_request() {
    let url = spawn_server().await;
    let mut ws = connect(&url).await;

    send_json(&mut ws, json!({ "type": "no_such_event" })).await;
    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["kind"], "BadRequest");
}
