//! Live feed over a real WebSocket connection.

mod common;

use std::time::Duration;

use common::{build_test_app, token, TestApp};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

type Client = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn serve(app: &TestApp) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn connect(addr: std::net::SocketAddr, user_id: i64) -> Client {
    let url = format!("ws://{addr}/api/v1/ws?token={}", token(user_id, "employee"));
    let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    client
}

/// Next JSON text frame, skipping control frames.
async fn next_frame(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn assign(app: &TestApp, recipient_id: i64, vehicle_id: i64) {
    app.state
        .notifier
        .notify_named(
            "vehicle_assigned",
            recipient_id,
            json!({ "vehicle_id": vehicle_id, "license_plate": "WS42" }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn session_starts_with_sync_then_streams_new_alerts() {
    let app = build_test_app();
    assign(&app, 7, 1).await;
    let addr = serve(&app).await;

    let mut client = connect(addr, 7).await;
    let sync = next_frame(&mut client).await;
    assert_eq!(sync["type"], "sync");
    assert_eq!(sync["unread_count"], 1);

    assign(&app, 7, 2).await;
    let frame = next_frame(&mut client).await;
    assert_eq!(frame["type"], "alert");
    assert_eq!(frame["alert"]["recipient_id"], 7);
    let tag = format!("alert-{}", frame["alert"]["id"]);
    assert_eq!(frame["local_alert"]["tag"], tag.as_str());
}

#[tokio::test]
async fn other_recipients_alerts_are_not_streamed() {
    let app = build_test_app();
    let addr = serve(&app).await;

    let mut client = connect(addr, 7).await;
    assert_eq!(next_frame(&mut client).await["type"], "sync");

    assign(&app, 8, 1).await;
    assign(&app, 7, 2).await;

    let frame = next_frame(&mut client).await;
    assert_eq!(frame["alert"]["recipient_id"], 7);
}

#[tokio::test]
async fn read_state_changes_reach_the_session() {
    let app = build_test_app();
    let addr = serve(&app).await;

    let mut client = connect(addr, 7).await;
    assert_eq!(next_frame(&mut client).await["type"], "sync");

    assign(&app, 7, 1).await;
    let id = next_frame(&mut client).await["alert"]["id"].as_i64().unwrap();

    app.state.feed.mark_read(7, id).await.unwrap();
    let frame = next_frame(&mut client).await;
    assert_eq!(frame["type"], "read");
    assert_eq!(frame["ids"], json!([id]));
}

#[tokio::test]
async fn closing_the_socket_releases_the_subscription() {
    let app = build_test_app();
    let addr = serve(&app).await;

    let mut client = connect(addr, 7).await;
    assert_eq!(next_frame(&mut client).await["type"], "sync");
    assert_eq!(app.state.hub.subscriber_count(7), 1);

    client.close(None).await.unwrap();

    let mut released = false;
    for _ in 0..50 {
        if app.state.hub.subscriber_count(7) == 0 && app.state.ws_manager.connection_count().await == 0 {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(released, "session should deregister after close");
}

#[tokio::test]
async fn handshake_without_token_is_rejected() {
    let app = build_test_app();
    let addr = serve(&app).await;

    let result = tokio_tungstenite::connect_async(format!("ws://{addr}/api/v1/ws")).await;
    assert!(result.is_err());
}
