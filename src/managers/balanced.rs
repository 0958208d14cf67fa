use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use super::feed_core::{FeedCore, FeedView, ManagerState};
use super::EntityOwner;
use crate::entity::builders::{DomainBuilder, MarketBuilder};
use crate::entity::records::MarketRecord;
use crate::entity::{EntityStore, Market, Outcome};
use crate::error::ServiceError;
use crate::feed::{FeedConnector, Topic};
use crate::lifecycle::LifecycleStream;

struct BalancedView {
    match_id: String,
    betting_type_id: String,
}

impl FeedView for BalancedView {
    type Output = Vec<Market>;

    // Main line first; the rest keep feed order.
    fn project(&self, store: &EntityStore) -> Vec<Market> {
        let mut markets: Vec<Market> = store
            .iter::<MarketRecord>()
            .filter(|market| market.event_id == self.match_id && market.betting_type_id == self.betting_type_id)
            .map(|market| MarketBuilder::build(market, store))
            .collect();
        markets.sort_by_key(|market| !market.is_main_line);
        markets
    }
}

/// Balanced lines of one betting type for one match.
pub struct BalancedMarketManager {
    match_id: String,
    betting_type_id: String,
    event_part_id: String,
    core: FeedCore<BalancedView>,
}

impl BalancedMarketManager {
    pub fn new(
        connector: Arc<dyn FeedConnector>,
        match_id: impl Into<String>,
        betting_type_id: impl Into<String>,
        event_part_id: impl Into<String>,
    ) -> Self {
        let match_id = match_id.into();
        let betting_type_id = betting_type_id.into();
        Self {
            core: FeedCore::new(
                "balanced-market",
                connector,
                BalancedView {
                    match_id: match_id.clone(),
                    betting_type_id: betting_type_id.clone(),
                },
            ),
            match_id,
            betting_type_id,
            event_part_id: event_part_id.into(),
        }
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn state(&self) -> ManagerState {
        self.core.state()
    }

    pub fn last_error(&self) -> Option<ServiceError> {
        self.core.last_error()
    }

    pub fn subscribe(&self) -> LifecycleStream<Vec<Market>> {
        info!(
            "Subscribing to balanced markets {} for match {}",
            self.betting_type_id, self.match_id
        );
        self.core.subscribe(Topic::BalancedMarketOdds {
            match_id: self.match_id.clone(),
            betting_type_id: self.betting_type_id.clone(),
            event_part_id: self.event_part_id.clone(),
        })
    }

    /// Markets currently held, main line first.
    pub fn markets(&self) -> Vec<Market> {
        self.core.with_store(|store| self.core.view().project(store))
    }

    pub async fn unsubscribe(&self) {
        self.core.unsubscribe().await;
    }
}

impl EntityOwner for BalancedMarketManager {
    fn market_exists(&self, id: &str) -> bool {
        self.core.market_exists(id)
    }

    fn outcome_exists(&self, id: &str) -> bool {
        self.core.outcome_exists(id)
    }

    fn subscribe_to_market_updates(&self, id: &str) -> watch::Receiver<Option<Market>> {
        self.core.subscribe_to_market_updates(id)
    }

    fn subscribe_to_outcome_updates(&self, id: &str) -> watch::Receiver<Option<Outcome>> {
        self.core.subscribe_to_outcome_updates(id)
    }
}
