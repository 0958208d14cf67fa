use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use super::feed_core::{FeedCore, FeedView, ManagerState};
use super::EntityOwner;
use crate::entity::builders::{BettingOfferBuilder, DomainBuilder};
use crate::entity::records::BettingOfferRecord;
use crate::entity::{build_outcome, BettingOffer, EntityStore, Market, Outcome};
use crate::error::ServiceError;
use crate::feed::{FeedConnector, Topic};
use crate::lifecycle::LifecycleStream;

struct OutcomeView {
    outcome_id: String,
}

impl FeedView for OutcomeView {
    type Output = Option<Outcome>;

    fn project(&self, store: &EntityStore) -> Option<Outcome> {
        build_outcome(store, &self.outcome_id)
    }
}

/// Follows a single outcome through its betting offer's feed.
pub struct SingleOutcomeManager {
    outcome_id: String,
    betting_offer_id: String,
    core: FeedCore<OutcomeView>,
}

impl SingleOutcomeManager {
    pub fn new(
        connector: Arc<dyn FeedConnector>,
        outcome_id: impl Into<String>,
        betting_offer_id: impl Into<String>,
    ) -> Self {
        let outcome_id = outcome_id.into();
        Self {
            core: FeedCore::new(
                "single-outcome",
                connector,
                OutcomeView {
                    outcome_id: outcome_id.clone(),
                },
            ),
            outcome_id,
            betting_offer_id: betting_offer_id.into(),
        }
    }

    pub fn outcome_id(&self) -> &str {
        &self.outcome_id
    }

    pub fn betting_offer_id(&self) -> &str {
        &self.betting_offer_id
    }

    pub fn state(&self) -> ManagerState {
        self.core.state()
    }

    pub fn last_error(&self) -> Option<ServiceError> {
        self.core.last_error()
    }

    pub fn subscribe(&self) -> LifecycleStream<Option<Outcome>> {
        info!(
            "Subscribing to outcome {} via offer {}",
            self.outcome_id, self.betting_offer_id
        );
        self.core.subscribe(Topic::BettingOffer {
            betting_offer_id: self.betting_offer_id.clone(),
        })
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.core
            .with_store(|store| build_outcome(store, &self.outcome_id))
    }

    pub fn betting_offer(&self) -> Option<BettingOffer> {
        self.core.with_store(|store| {
            store
                .get::<BettingOfferRecord>(&self.betting_offer_id)
                .map(|offer| BettingOfferBuilder::build(offer, store))
        })
    }

    pub async fn unsubscribe(&self) {
        self.core.unsubscribe().await;
    }
}

impl EntityOwner for SingleOutcomeManager {
    fn market_exists(&self, id: &str) -> bool {
        self.core.market_exists(id)
    }

    fn outcome_exists(&self, id: &str) -> bool {
        if self.core.state() == ManagerState::Unsubscribed {
            return false;
        }
        id == self.outcome_id || self.core.outcome_exists(id)
    }

    fn subscribe_to_market_updates(&self, id: &str) -> watch::Receiver<Option<Market>> {
        self.core.subscribe_to_market_updates(id)
    }

    fn subscribe_to_outcome_updates(&self, id: &str) -> watch::Receiver<Option<Outcome>> {
        self.core.subscribe_to_outcome_updates(id)
    }
}
