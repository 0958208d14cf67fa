//! Ordered lifecycle delivery for live feeds.
//!
//! A feed moves through `Connecting, Connected, InitialContent,
//! UpdatedContent*, Disconnected`. [`LifecycleHub`] enforces that order and
//! fans every accepted state out to any number of subscribers.

use futures::channel::mpsc;
use futures::stream::{BoxStream, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Opaque server-side registration id, kept for teardown.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(String);

impl SubscriptionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionContent<T> {
    Connecting,
    Connected(SubscriptionHandle),
    InitialContent(T),
    UpdatedContent(T),
    Disconnected,
}

impl<T> SubscriptionContent<T> {
    pub fn content(&self) -> Option<&T> {
        match self {
            SubscriptionContent::InitialContent(content) | SubscriptionContent::UpdatedContent(content) => {
                Some(content)
            }
            _ => None,
        }
    }

    pub fn into_content(self) -> Option<T> {
        match self {
            SubscriptionContent::InitialContent(content) | SubscriptionContent::UpdatedContent(content) => {
                Some(content)
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubscriptionContent::Disconnected)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SubscriptionContent<U> {
        match self {
            SubscriptionContent::Connecting => SubscriptionContent::Connecting,
            SubscriptionContent::Connected(handle) => SubscriptionContent::Connected(handle),
            SubscriptionContent::InitialContent(content) => SubscriptionContent::InitialContent(f(content)),
            SubscriptionContent::UpdatedContent(content) => SubscriptionContent::UpdatedContent(f(content)),
            SubscriptionContent::Disconnected => SubscriptionContent::Disconnected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Connected,
    Live,
    Closed,
}

/// Rejects states that would break the lifecycle order.
#[derive(Debug, Clone)]
pub struct LifecycleGate {
    phase: Phase,
}

impl Default for LifecycleGate {
    fn default() -> Self {
        Self { phase: Phase::Pending }
    }
}

impl LifecycleGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `content` may be delivered, advancing the phase if so.
    pub fn admit<T>(&mut self, content: &SubscriptionContent<T>) -> bool {
        let next = match (self.phase, content) {
            (Phase::Closed, _) => return false,
            (_, SubscriptionContent::Disconnected) => Phase::Closed,
            (Phase::Pending, SubscriptionContent::Connecting) => Phase::Pending,
            (_, SubscriptionContent::Connecting) => return false,
            // A resized window reconnects and sends a fresh snapshot.
            (_, SubscriptionContent::Connected(_)) => Phase::Connected,
            (_, SubscriptionContent::InitialContent(_)) => Phase::Live,
            (Phase::Live, SubscriptionContent::UpdatedContent(_)) => Phase::Live,
            (_, SubscriptionContent::UpdatedContent(_)) => return false,
        };
        self.phase = next;
        true
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    pub fn has_content(&self) -> bool {
        self.phase == Phase::Live
    }
}

pub type LifecycleStream<T> = BoxStream<'static, SubscriptionContent<T>>;

struct HubState<T> {
    gate: LifecycleGate,
    subscribers: Vec<mpsc::UnboundedSender<SubscriptionContent<T>>>,
    handle: Option<SubscriptionHandle>,
    latest: Option<T>,
}

/// Multi-subscriber, push-based lifecycle channel.
///
/// Late subscribers are replayed the current handle and latest snapshot so
/// they never see an update without its initial content.
pub struct LifecycleHub<T> {
    state: Arc<Mutex<HubState<T>>>,
}

impl<T> Clone for LifecycleHub<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Default for LifecycleHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> LifecycleHub<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                gate: LifecycleGate::new(),
                subscribers: Vec::new(),
                handle: None,
                latest: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> LifecycleStream<T> {
        let (tx, rx) = mpsc::unbounded();
        let mut state = self.lock();

        if state.gate.is_closed() {
            let _ = tx.unbounded_send(SubscriptionContent::Disconnected);
            return rx.boxed();
        }
        match &state.handle {
            Some(handle) => {
                let _ = tx.unbounded_send(SubscriptionContent::Connected(handle.clone()));
            }
            None => {
                let _ = tx.unbounded_send(SubscriptionContent::Connecting);
            }
        }
        if let Some(latest) = &state.latest {
            let _ = tx.unbounded_send(SubscriptionContent::InitialContent(latest.clone()));
        }
        state.subscribers.push(tx);
        rx.boxed()
    }

    /// Deliver a state to every subscriber. Returns false if it was rejected.
    pub fn publish(&self, content: SubscriptionContent<T>) -> bool {
        let mut state = self.lock();
        if !state.gate.admit(&content) {
            debug!("Dropping out-of-order lifecycle state");
            return false;
        }

        match &content {
            SubscriptionContent::Connected(handle) => state.handle = Some(handle.clone()),
            SubscriptionContent::InitialContent(snapshot) | SubscriptionContent::UpdatedContent(snapshot) => {
                state.latest = Some(snapshot.clone())
            }
            _ => {}
        }

        state
            .subscribers
            .retain(|tx| tx.unbounded_send(content.clone()).is_ok());

        if content.is_terminal() {
            state.subscribers.clear();
            state.latest = None;
            state.handle = None;
        }
        true
    }

    /// Close the hub, delivering `Disconnected` unless already closed.
    pub fn close(&self) {
        self.publish(SubscriptionContent::Disconnected);
    }

    pub fn is_closed(&self) -> bool {
        self.lock().gate.is_closed()
    }

    pub fn latest(&self) -> Option<T> {
        self.lock().latest.clone()
    }

    pub fn handle(&self) -> Option<SubscriptionHandle> {
        self.lock().handle.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}
