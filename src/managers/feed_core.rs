//! Feed plumbing shared by every manager: one live subscription, one private
//! store, ordered lifecycle delivery and per-entity observers.

use futures::stream::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::entity::{build_market, build_outcome, EntityKind, EntityStore, Market, Outcome};
use crate::error::{Result, ServiceError};
use crate::feed::{FeedConnector, FeedEvent, Topic};
use crate::lifecycle::{LifecycleHub, LifecycleStream, SubscriptionContent, SubscriptionHandle};

/// What a feed's lifecycle carries, projected from its store.
pub trait FeedView: Send + Sync + 'static {
    type Output: Clone + Send + 'static;

    fn project(&self, store: &EntityStore) -> Self::Output;

    /// Called with the freshly rebuilt store after every full snapshot.
    fn snapshot_received(&self, _store: &EntityStore) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Idle,
    Subscribing,
    Active,
    Unsubscribed,
}

pub(crate) enum Resubscribe {
    NotSubscribed,
    Inactive,
    Busy,
    Declined,
    Pending(oneshot::Receiver<usize>),
}

struct FeedShared {
    store: EntityStore,
    state: ManagerState,
    handle: Option<SubscriptionHandle>,
    generation: u64,
    task: Option<JoinHandle<()>>,
    pending_page: Option<oneshot::Sender<usize>>,
    last_error: Option<ServiceError>,
    markets: HashMap<String, watch::Sender<Option<Market>>>,
    outcomes: HashMap<String, watch::Sender<Option<Outcome>>>,
}

fn publish_if_changed<T: PartialEq>(tx: &watch::Sender<T>, value: T) {
    tx.send_if_modified(|current| {
        if *current != value {
            *current = value;
            true
        } else {
            false
        }
    });
}

impl FeedShared {
    // Observers whose receivers are all gone are dropped here.
    fn refresh_observers(&mut self) {
        let store = &self.store;
        self.markets.retain(|id, tx| {
            if tx.receiver_count() == 0 {
                return false;
            }
            publish_if_changed(tx, build_market(store, id));
            true
        });
        self.outcomes.retain(|id, tx| {
            if tx.receiver_count() == 0 {
                return false;
            }
            publish_if_changed(tx, build_outcome(store, id));
            true
        });
    }
}

struct CoreInner<V: FeedView> {
    name: &'static str,
    connector: Arc<dyn FeedConnector>,
    view: V,
    shared: Mutex<FeedShared>,
    hub: LifecycleHub<V::Output>,
}

impl<V: FeedView> CoreInner<V> {
    fn lock(&self) -> MutexGuard<'_, FeedShared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one event of `generation`. Returns false once the feed is done.
    fn apply(&self, generation: u64, event: Result<FeedEvent>) -> bool {
        let mut guard = self.lock();
        let shared = &mut *guard;
        if shared.generation != generation || shared.state == ManagerState::Unsubscribed {
            debug!("{}: discarding event from stale subscription", self.name);
            return false;
        }

        match event {
            Ok(FeedEvent::Connect(handle)) => {
                debug!("{}: connected as {}", self.name, handle.as_str());
                shared.handle = Some(handle.clone());
                self.hub.publish(SubscriptionContent::Connected(handle));
                true
            }
            Ok(FeedEvent::InitialContent(response)) => {
                shared.store.replace_all(response.records);
                shared.state = ManagerState::Active;
                self.view.snapshot_received(&shared.store);
                shared.refresh_observers();
                let output = self.view.project(&shared.store);
                if let Some(tx) = shared.pending_page.take() {
                    let _ = tx.send(shared.store.count(EntityKind::Match));
                }
                debug!(
                    "{}: initial content with {} records",
                    self.name,
                    shared.store.len()
                );
                self.hub.publish(SubscriptionContent::InitialContent(output));
                true
            }
            Ok(FeedEvent::UpdatedContent(response)) => {
                if shared.state != ManagerState::Active {
                    debug!("{}: update before initial content ignored", self.name);
                    return true;
                }
                let touched = shared.store.store(response.records);
                if touched.is_empty() {
                    return true;
                }
                shared.refresh_observers();
                let output = self.view.project(&shared.store);
                self.hub.publish(SubscriptionContent::UpdatedContent(output));
                true
            }
            Ok(FeedEvent::Disconnect) => {
                info!("{}: feed disconnected by server", self.name);
                self.finish(shared, None);
                false
            }
            Err(err) => {
                warn!("{}: feed failed: {}", self.name, err);
                self.finish(shared, Some(err));
                false
            }
        }
    }

    fn finish(&self, shared: &mut FeedShared, error: Option<ServiceError>) {
        shared.state = ManagerState::Unsubscribed;
        shared.handle = None;
        shared.pending_page = None;
        shared.last_error = error;
        shared.task = None;
        self.hub.close();
    }
}

/// One live feed with a private [`EntityStore`].
pub struct FeedCore<V: FeedView> {
    inner: Arc<CoreInner<V>>,
}

impl<V: FeedView> Clone for FeedCore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V: FeedView> FeedCore<V> {
    pub fn new(name: &'static str, connector: Arc<dyn FeedConnector>, view: V) -> Self {
        Self {
            inner: Arc::new(CoreInner {
                name,
                connector,
                view,
                shared: Mutex::new(FeedShared {
                    store: EntityStore::new(),
                    state: ManagerState::Idle,
                    handle: None,
                    generation: 0,
                    task: None,
                    pending_page: None,
                    last_error: None,
                    markets: HashMap::new(),
                    outcomes: HashMap::new(),
                }),
                hub: LifecycleHub::new(),
            }),
        }
    }

    pub fn view(&self) -> &V {
        &self.inner.view
    }

    pub fn state(&self) -> ManagerState {
        self.inner.lock().state
    }

    pub fn handle(&self) -> Option<SubscriptionHandle> {
        self.inner.lock().handle.clone()
    }

    pub fn last_error(&self) -> Option<ServiceError> {
        self.inner.lock().last_error.clone()
    }

    pub fn is_paging(&self) -> bool {
        self.inner.lock().pending_page.is_some()
    }

    /// Read the store under the feed lock.
    pub fn with_store<R>(&self, f: impl FnOnce(&EntityStore) -> R) -> R {
        f(&self.inner.lock().store)
    }

    /// Open the feed on first call; later calls only attach another observer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self, topic: Topic) -> LifecycleStream<V::Output> {
        let mut shared = self.inner.lock();
        let stream = self.inner.hub.subscribe();
        if shared.state == ManagerState::Idle {
            info!("{}: subscribing to {}", self.inner.name, topic);
            shared.state = ManagerState::Subscribing;
            shared.task = Some(self.spawn(topic, shared.generation));
        }
        stream
    }

    /// Replace the live subscription with `next_topic()`, if allowed.
    ///
    /// `next_topic` runs under the feed lock; returning `None` declines.
    pub(crate) async fn resubscribe(&self, next_topic: impl FnOnce() -> Option<Topic>) -> Resubscribe {
        let (previous, rx) = {
            let mut guard = self.inner.lock();
            let shared = &mut *guard;
            match shared.state {
                ManagerState::Idle => return Resubscribe::NotSubscribed,
                ManagerState::Unsubscribed => return Resubscribe::Inactive,
                ManagerState::Subscribing | ManagerState::Active => {}
            }
            if shared.pending_page.is_some() {
                return Resubscribe::Busy;
            }
            let Some(topic) = next_topic() else {
                return Resubscribe::Declined;
            };

            info!("{}: resubscribing to {}", self.inner.name, topic);
            shared.generation += 1;
            if let Some(task) = shared.task.take() {
                task.abort();
            }
            let previous = shared.handle.take();
            shared.store.clear();
            shared.state = ManagerState::Subscribing;
            let (tx, rx) = oneshot::channel();
            shared.pending_page = Some(tx);
            shared.task = Some(self.spawn(topic, shared.generation));
            (previous, rx)
        };

        if let Some(handle) = previous {
            self.release(&handle).await;
        }
        Resubscribe::Pending(rx)
    }

    /// Tear the feed down. Idempotent.
    pub async fn unsubscribe(&self) {
        let handle = {
            let mut shared = self.inner.lock();
            if shared.state == ManagerState::Unsubscribed {
                return;
            }
            info!("{}: unsubscribing", self.inner.name);
            shared.state = ManagerState::Unsubscribed;
            shared.generation += 1;
            shared.pending_page = None;
            shared.markets.clear();
            shared.outcomes.clear();
            if let Some(task) = shared.task.take() {
                task.abort();
            }
            shared.handle.take()
        };

        self.inner.hub.close();
        if let Some(handle) = handle {
            self.release(&handle).await;
        }
    }

    async fn release(&self, handle: &SubscriptionHandle) {
        if let Err(err) = self.inner.connector.unsubscribe(handle).await {
            warn!(
                "{}: failed to release subscription {}: {}",
                self.inner.name,
                handle.as_str(),
                err
            );
        }
    }

    fn spawn(&self, topic: Topic, generation: u64) -> JoinHandle<()> {
        let weak: Weak<CoreInner<V>> = Arc::downgrade(&self.inner);
        let connector = self.inner.connector.clone();

        tokio::spawn(async move {
            let mut events = match connector.subscribe(topic).await {
                Ok(events) => events,
                Err(err) => {
                    if let Some(inner) = weak.upgrade() {
                        inner.apply(generation, Err(err));
                    }
                    return;
                }
            };

            while let Some(event) = events.next().await {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.apply(generation, event) {
                    return;
                }
            }

            // A stream that ends without an explicit disconnect is treated as one.
            if let Some(inner) = weak.upgrade() {
                inner.apply(generation, Ok(FeedEvent::Disconnect));
            }
        })
    }

    /// Whether this live feed holds `id`. An ended feed owns nothing.
    fn owns(&self, kind: EntityKind, id: &str) -> bool {
        let shared = self.inner.lock();
        shared.state != ManagerState::Unsubscribed && shared.store.contains(kind, id)
    }

    pub fn market_exists(&self, id: &str) -> bool {
        self.owns(EntityKind::Market, id)
    }

    pub fn outcome_exists(&self, id: &str) -> bool {
        self.owns(EntityKind::Outcome, id)
    }

    pub fn betting_offer_exists(&self, id: &str) -> bool {
        self.with_store(|store| store.contains(EntityKind::BettingOffer, id))
    }

    /// Observe one market; the value is rebuilt after every store change.
    pub fn subscribe_to_market_updates(&self, id: &str) -> watch::Receiver<Option<Market>> {
        let mut guard = self.inner.lock();
        let shared = &mut *guard;
        if let Some(tx) = shared.markets.get(id) {
            return tx.subscribe();
        }
        let (tx, rx) = watch::channel(build_market(&shared.store, id));
        if shared.state != ManagerState::Unsubscribed {
            shared.markets.insert(id.to_string(), tx);
        }
        rx
    }

    /// Observe one outcome, including odds changes on its betting offers.
    pub fn subscribe_to_outcome_updates(&self, id: &str) -> watch::Receiver<Option<Outcome>> {
        let mut guard = self.inner.lock();
        let shared = &mut *guard;
        if let Some(tx) = shared.outcomes.get(id) {
            return tx.subscribe();
        }
        let (tx, rx) = watch::channel(build_outcome(&shared.store, id));
        if shared.state != ManagerState::Unsubscribed {
            shared.outcomes.insert(id.to_string(), tx);
        }
        rx
    }
}

impl<V: FeedView> Drop for CoreInner<V> {
    fn drop(&mut self) {
        let shared = self.shared.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = shared.task.take() {
            task.abort();
        }
        if shared.state != ManagerState::Unsubscribed && shared.handle.is_some() {
            warn!("{}: dropped without unsubscribe, server handle leaked", self.name);
        }
    }
}
