use sportsbook_sync::connection_state::{ConnectionManager, ConnectionState};
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test]
async fn test_connection_state_manager_new() {
    let manager = ConnectionManager::new();
    assert_eq!(manager.get_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_set_and_get_state() {
    let manager = ConnectionManager::new();

    manager.set_state(ConnectionState::Connecting).await;
    assert_eq!(manager.get_state(), ConnectionState::Connecting);

    manager.set_state(ConnectionState::Connected).await;
    assert_eq!(manager.get_state(), ConnectionState::Connected);

    manager
        .set_state(ConnectionState::Failed("dns".to_string()))
        .await;
    assert_eq!(manager.get_state(), ConnectionState::Failed("dns".to_string()));
}

#[tokio::test]
async fn test_reconnect_attempts() {
    let manager = ConnectionManager::new();
    assert_eq!(manager.get_reconnect_attempts().await, 0);

    manager.set_state(ConnectionState::Reconnecting).await;
    assert_eq!(manager.get_reconnect_attempts().await, 1);

    manager.set_state(ConnectionState::Reconnecting).await;
    assert_eq!(manager.get_reconnect_attempts().await, 2);

    manager.set_state(ConnectionState::Connected).await;
    assert_eq!(manager.get_reconnect_attempts().await, 0);
}

#[tokio::test]
async fn test_is_connected() {
    let manager = ConnectionManager::new();
    assert!(!manager.is_connected());

    manager.set_state(ConnectionState::Connected).await;
    assert!(manager.is_connected());

    manager.set_state(ConnectionState::Reconnecting).await;
    assert!(!manager.is_connected());
}

#[tokio::test]
async fn test_last_connected_duration() {
    let manager = ConnectionManager::new();
    assert!(manager.last_connected_duration().await.is_none());

    manager.set_state(ConnectionState::Connected).await;
    sleep(Duration::from_millis(50)).await;

    let duration = manager.last_connected_duration().await;
    assert!(duration.unwrap() >= Duration::from_millis(50));
}

#[tokio::test]
async fn test_observers_only_see_transitions() {
    let manager = ConnectionManager::new();
    let mut rx = manager.subscribe();
    assert_eq!(*rx.borrow_and_update(), ConnectionState::Disconnected);

    manager.set_state(ConnectionState::Disconnected).await;
    assert!(!rx.has_changed().unwrap());

    manager.set_state(ConnectionState::Connected).await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_clones_share_state() {
    let manager = ConnectionManager::new();
    let clone = manager.clone();

    clone.set_state(ConnectionState::Connected).await;
    assert!(manager.is_connected());
}
