//! Unit tests for `WsManager`, without any HTTP upgrade.

use axum::extract::ws::Message;
use fleetwatch_api::ws::WsManager;

#[tokio::test]
async fn sessions_are_counted_per_user() {
    let manager = WsManager::new();

    let _a = manager.add("conn-1".to_string(), 7).await;
    let _b = manager.add("conn-2".to_string(), 7).await;
    let _c = manager.add("conn-3".to_string(), 8).await;

    assert_eq!(manager.connection_count().await, 3);
    assert_eq!(manager.sessions_for(7).await, 2);
    assert_eq!(manager.sessions_for(9).await, 0);
}

#[tokio::test]
async fn remove_unknown_id_is_noop() {
    let manager = WsManager::new();

    let _rx = manager.add("conn-1".to_string(), 7).await;
    manager.remove("nonexistent").await;
    assert_eq!(manager.connection_count().await, 1);

    manager.remove("conn-1").await;
    assert_eq!(manager.connection_count().await, 0);
}

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string(), 7).await;
    let mut rx2 = manager.add("conn-2".to_string(), 8).await;

    manager.shutdown_all().await;

    assert_eq!(manager.connection_count().await, 0);
    let msg1 = rx1.recv().await.expect("rx1 should receive Close");
    assert!(matches!(msg1, Message::Close(None)), "got: {msg1:?}");
    let msg2 = rx2.recv().await.expect("rx2 should receive Close");
    assert!(matches!(msg2, Message::Close(None)), "got: {msg2:?}");

    // Senders were dropped with the registry.
    assert!(rx1.recv().await.is_none());
}

#[tokio::test]
async fn ping_all_skips_closed_channels() {
    let manager = WsManager::new();

    let rx1 = manager.add("conn-1".to_string(), 7).await;
    let mut rx2 = manager.add("conn-2".to_string(), 7).await;
    drop(rx1);

    manager.ping_all().await;

    let msg = rx2.recv().await.expect("rx2 should receive Ping");
    assert!(matches!(msg, Message::Ping(_)));
}
