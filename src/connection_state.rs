use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed(String),
}

/// Connectivity observable shared by a transport and its observers.
#[derive(Clone)]
pub struct ConnectionManager {
    state: Arc<watch::Sender<ConnectionState>>,
    last_connected: Arc<RwLock<Option<Instant>>>,
    reconnect_attempts: Arc<RwLock<u32>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::with_state(ConnectionState::Disconnected)
    }

    pub fn with_state(initial: ConnectionState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state: Arc::new(state),
            last_connected: Arc::new(RwLock::new(None)),
            reconnect_attempts: Arc::new(RwLock::new(0)),
        }
    }

    pub fn get_state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Observe state changes. The receiver starts with the current value.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub async fn set_state(&self, new_state: ConnectionState) {
        match &new_state {
            ConnectionState::Connected => {
                *self.last_connected.write().await = Some(Instant::now());
                *self.reconnect_attempts.write().await = 0;
            }
            ConnectionState::Reconnecting => {
                *self.reconnect_attempts.write().await += 1;
            }
            _ => {}
        }

        // Observers only wake on an actual transition.
        self.state.send_if_modified(|current| {
            if *current == new_state {
                false
            } else {
                *current = new_state;
                true
            }
        });
    }

    pub async fn get_reconnect_attempts(&self) -> u32 {
        *self.reconnect_attempts.read().await
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.state.borrow(), ConnectionState::Connected)
    }

    pub async fn last_connected_duration(&self) -> Option<std::time::Duration> {
        self.last_connected
            .read()
            .await
            .map(|instant| instant.elapsed())
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
