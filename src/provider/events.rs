use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use super::models::{SearchHit, SearchResults};
use crate::config::{Config, FeedConfig};
use crate::connector::AuthenticatedConnector;
use crate::endpoint::Endpoint;
use crate::entity::{Market, Match, Outcome};
use crate::error::{Result, ServiceError};
use crate::feed::{FeedConnector, FeedRouter, MatchFilter, RoutedFeeds};
use crate::lifecycle::LifecycleStream;
use crate::managers::{
    find_market_owner, find_outcome_owner, BalancedMarketManager, EntityOwner, ManagerState, MatchesFeed,
    MatchesManager, SingleOutcomeManager,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    PreLive,
    Live,
}

/// Identity of a match-list feed: one active manager per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedKey {
    pub kind: FeedKind,
    pub sport_id: String,
    pub filter: Option<MatchFilter>,
}

#[derive(Default)]
struct Registry {
    pre_live: Option<(FeedKey, Arc<MatchesManager>)>,
    live: Option<(FeedKey, Arc<MatchesManager>)>,
    single_outcomes: HashMap<String, Arc<SingleOutcomeManager>>,
    balanced: HashMap<(String, String), Arc<BalancedMarketManager>>,
}

impl Registry {
    fn slot(&mut self, kind: FeedKind) -> &mut Option<(FeedKey, Arc<MatchesManager>)> {
        match kind {
            FeedKind::PreLive => &mut self.pre_live,
            FeedKind::Live => &mut self.live,
        }
    }

    // Match lists first, then the narrower feeds. Ended feeds own nothing.
    fn owners(&self) -> Vec<&dyn EntityOwner> {
        let mut owners: Vec<&dyn EntityOwner> = Vec::new();
        for (_, manager) in self.pre_live.iter().chain(self.live.iter()) {
            if is_live(manager.state()) {
                owners.push(&**manager);
            }
        }
        for manager in self.single_outcomes.values() {
            if is_live(manager.state()) {
                owners.push(&**manager);
            }
        }
        for manager in self.balanced.values() {
            if is_live(manager.state()) {
                owners.push(&**manager);
            }
        }
        owners
    }
}

fn is_live(state: ManagerState) -> bool {
    state != ManagerState::Unsubscribed
}

/// Match lists and per-entity observation over live feeds.
pub struct EventsProvider {
    feeds: Arc<dyn FeedConnector>,
    connector: AuthenticatedConnector,
    config: FeedConfig,
    language: String,
    registry: Mutex<Registry>,
}

impl EventsProvider {
    pub fn new(
        feeds: Arc<dyn FeedConnector>,
        connector: AuthenticatedConnector,
        config: FeedConfig,
        language: impl Into<String>,
    ) -> Self {
        Self {
            feeds,
            connector,
            config,
            language: language.into(),
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Feeds routed under the configured operator and language.
    pub fn from_config(router: Arc<dyn FeedRouter>, connector: AuthenticatedConnector, config: &Config) -> Self {
        let feeds = Arc::new(RoutedFeeds::from_config(router, &config.platform));
        Self::new(
            feeds,
            connector,
            config.feeds.clone(),
            config.platform.language.clone(),
        )
    }

    pub async fn subscribe_pre_live_matches(
        &self,
        sport_id: &str,
        filter: Option<MatchFilter>,
    ) -> LifecycleStream<Vec<Match>> {
        let key = FeedKey {
            kind: FeedKind::PreLive,
            sport_id: sport_id.to_string(),
            filter,
        };
        self.subscribe_matches(key).await
    }

    pub async fn subscribe_live_matches(&self, sport_id: &str) -> LifecycleStream<Vec<Match>> {
        let key = FeedKey {
            kind: FeedKind::Live,
            sport_id: sport_id.to_string(),
            filter: None,
        };
        self.subscribe_matches(key).await
    }

    async fn subscribe_matches(&self, key: FeedKey) -> LifecycleStream<Vec<Match>> {
        let mut registry = self.registry.lock().await;
        let slot = registry.slot(key.kind);

        if let Some((active_key, manager)) = slot.as_ref() {
            if *active_key == key && is_live(manager.state()) {
                debug!("Reusing active {:?} feed for sport {}", key.kind, key.sport_id);
                return manager.subscribe();
            }
        }
        // The stale feed is released before its replacement registers.
        if let Some((stale_key, stale)) = slot.take() {
            info!(
                "Replacing {:?} feed for sport {} with sport {}",
                stale_key.kind, stale_key.sport_id, key.sport_id
            );
            stale.unsubscribe().await;
        }

        let feed = match key.kind {
            FeedKind::PreLive => MatchesFeed::PreLive {
                filter: key.filter.clone(),
            },
            FeedKind::Live => MatchesFeed::Live,
        };
        let manager = Arc::new(MatchesManager::new(
            self.feeds.clone(),
            feed,
            key.sport_id.clone(),
            &self.config,
        ));
        let stream = manager.subscribe();
        let kind = key.kind;
        *registry.slot(kind) = Some((key, manager));
        stream
    }

    async fn matches_manager(&self, kind: FeedKind) -> Option<Arc<MatchesManager>> {
        let mut registry = self.registry.lock().await;
        registry.slot(kind).as_ref().map(|(_, manager)| manager.clone())
    }

    /// Widen the active pre-live window. Fails with `NotSubscribed` when there is none.
    pub async fn load_next_pre_live_page(&self) -> Result<bool> {
        match self.matches_manager(FeedKind::PreLive).await {
            Some(manager) => manager.load_next_page().await,
            None => Err(ServiceError::NotSubscribed),
        }
    }

    pub async fn load_next_live_page(&self) -> Result<bool> {
        match self.matches_manager(FeedKind::Live).await {
            Some(manager) => manager.load_next_page().await,
            None => Err(ServiceError::NotSubscribed),
        }
    }

    pub async fn pre_live_manager(&self) -> Option<Arc<MatchesManager>> {
        self.matches_manager(FeedKind::PreLive).await
    }

    pub async fn live_manager(&self) -> Option<Arc<MatchesManager>> {
        self.matches_manager(FeedKind::Live).await
    }

    pub async fn subscribe_single_outcome(
        &self,
        outcome_id: &str,
        betting_offer_id: &str,
    ) -> LifecycleStream<Option<Outcome>> {
        let mut registry = self.registry.lock().await;
        if let Some(manager) = registry.single_outcomes.get(outcome_id) {
            if is_live(manager.state()) {
                return manager.subscribe();
            }
        }
        if let Some(ended) = registry.single_outcomes.remove(outcome_id) {
            debug!("Replacing ended feed for outcome {}", outcome_id);
            ended.unsubscribe().await;
        }
        let manager = Arc::new(SingleOutcomeManager::new(
            self.feeds.clone(),
            outcome_id,
            betting_offer_id,
        ));
        let stream = manager.subscribe();
        registry
            .single_outcomes
            .insert(outcome_id.to_string(), manager);
        stream
    }

    pub async fn unsubscribe_single_outcome(&self, outcome_id: &str) {
        let manager = self.registry.lock().await.single_outcomes.remove(outcome_id);
        if let Some(manager) = manager {
            manager.unsubscribe().await;
        }
    }

    pub async fn subscribe_balanced_markets(
        &self,
        match_id: &str,
        betting_type_id: &str,
        event_part_id: &str,
    ) -> LifecycleStream<Vec<Market>> {
        let key = (match_id.to_string(), betting_type_id.to_string());
        let mut registry = self.registry.lock().await;
        if let Some(manager) = registry.balanced.get(&key) {
            if is_live(manager.state()) {
                return manager.subscribe();
            }
        }
        if let Some(ended) = registry.balanced.remove(&key) {
            debug!("Replacing ended balanced feed for match {}", match_id);
            ended.unsubscribe().await;
        }
        let manager = Arc::new(BalancedMarketManager::new(
            self.feeds.clone(),
            match_id,
            betting_type_id,
            event_part_id,
        ));
        let stream = manager.subscribe();
        registry.balanced.insert(key, manager);
        stream
    }

    pub async fn unsubscribe_balanced_markets(&self, match_id: &str, betting_type_id: &str) {
        let key = (match_id.to_string(), betting_type_id.to_string());
        let manager = self.registry.lock().await.balanced.remove(&key);
        if let Some(manager) = manager {
            manager.unsubscribe().await;
        }
    }

    /// Observe a market held by any active feed.
    pub async fn subscribe_to_market_updates(&self, market_id: &str) -> Result<watch::Receiver<Option<Market>>> {
        let registry = self.registry.lock().await;
        find_market_owner(registry.owners(), market_id)
            .map(|owner| owner.subscribe_to_market_updates(market_id))
            .ok_or_else(|| {
                ServiceError::ErrorMessage(format!(
                    "Market with id {} not found in any active feed",
                    market_id
                ))
            })
    }

    /// Observe an outcome held by any active feed.
    pub async fn subscribe_to_outcome_updates(&self, outcome_id: &str) -> Result<watch::Receiver<Option<Outcome>>> {
        let registry = self.registry.lock().await;
        find_outcome_owner(registry.owners(), outcome_id)
            .map(|owner| owner.subscribe_to_outcome_updates(outcome_id))
            .ok_or_else(|| {
                ServiceError::ErrorMessage(format!(
                    "Outcome with id {} not found in any active feed",
                    outcome_id
                ))
            })
    }

    pub async fn unsubscribe_matches(&self, kind: FeedKind) {
        let stale = self.registry.lock().await.slot(kind).take();
        if let Some((_, manager)) = stale {
            manager.unsubscribe().await;
        }
    }

    /// Tear down every feed this provider opened.
    pub async fn unsubscribe_all(&self) {
        let registry = std::mem::take(&mut *self.registry.lock().await);
        for (_, manager) in registry.pre_live.into_iter().chain(registry.live) {
            manager.unsubscribe().await;
        }
        for manager in registry.single_outcomes.into_values() {
            manager.unsubscribe().await;
        }
        for manager in registry.balanced.into_values() {
            manager.unsubscribe().await;
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let results: SearchResults = self
            .connector
            .execute(&Endpoint::Search {
                query: query.to_string(),
                language: self.language.clone(),
            })
            .await?;
        Ok(results.results)
    }
}
