use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info};

use super::feed_core::{FeedCore, FeedView, ManagerState, Resubscribe};
use super::{EntityOwner, PageCursor};
use crate::config::FeedConfig;
use crate::entity::{build_main_markets, build_matches, EntityKind, EntityStore, MainMarket, Market, Match, Outcome};
use crate::error::{Result, ServiceError};
use crate::feed::{FeedConnector, MatchFilter, Topic};
use crate::lifecycle::LifecycleStream;

/// Which match list a [`MatchesManager`] follows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchesFeed {
    /// Upcoming matches, optionally narrowed by a filter.
    PreLive { filter: Option<MatchFilter> },
    Live,
}

impl MatchesFeed {
    fn topic(&self, sport_id: &str, event_limit: usize, main_markets_limit: usize) -> Topic {
        match self {
            MatchesFeed::PreLive { filter: None } => Topic::PopularMatches {
                sport_id: sport_id.to_string(),
                event_limit,
                main_markets_limit,
            },
            MatchesFeed::PreLive { filter: Some(filter) } => Topic::CustomMatches {
                sport_id: sport_id.to_string(),
                filter: filter.clone(),
                event_limit,
                main_markets_limit,
            },
            MatchesFeed::Live => Topic::LiveMatches {
                sport_id: sport_id.to_string(),
                event_limit,
                main_markets_limit,
            },
        }
    }

    fn label(&self) -> &'static str {
        match self {
            MatchesFeed::PreLive { .. } => "pre-live matches",
            MatchesFeed::Live => "live matches",
        }
    }
}

fn lock_cursor(cursor: &Mutex<PageCursor>) -> MutexGuard<'_, PageCursor> {
    cursor.lock().unwrap_or_else(PoisonError::into_inner)
}

struct MatchesView {
    cursor: Arc<Mutex<PageCursor>>,
}

impl FeedView for MatchesView {
    type Output = Vec<Match>;

    fn project(&self, store: &EntityStore) -> Vec<Match> {
        build_matches(store)
    }

    fn snapshot_received(&self, store: &EntityStore) {
        let received = store.count(EntityKind::Match);
        let mut cursor = lock_cursor(&self.cursor);
        if !cursor.record_window(received) {
            debug!(
                "Received {} matches for a window of {}, no more pages",
                received,
                cursor.page_size()
            );
        }
    }
}

/// Paginated live list of matches for one sport.
///
/// Paging re-requests a wider window and replaces the previous subscription;
/// it never appends. Lifecycle states carry the full, ordered match list.
pub struct MatchesManager {
    feed: MatchesFeed,
    sport_id: String,
    main_markets_limit: usize,
    cursor: Arc<Mutex<PageCursor>>,
    core: FeedCore<MatchesView>,
}

impl MatchesManager {
    pub fn new(
        connector: Arc<dyn FeedConnector>,
        feed: MatchesFeed,
        sport_id: impl Into<String>,
        config: &FeedConfig,
    ) -> Self {
        let cursor = Arc::new(Mutex::new(PageCursor::new(
            config.initial_page_size,
            config.max_page_size,
        )));
        let name = match feed {
            MatchesFeed::PreLive { .. } => "pre-live",
            MatchesFeed::Live => "live",
        };
        Self {
            core: FeedCore::new(
                name,
                connector,
                MatchesView {
                    cursor: cursor.clone(),
                },
            ),
            feed,
            sport_id: sport_id.into(),
            main_markets_limit: config.main_markets_limit,
            cursor,
        }
    }

    pub fn pre_live(
        connector: Arc<dyn FeedConnector>,
        sport_id: impl Into<String>,
        filter: Option<MatchFilter>,
        config: &FeedConfig,
    ) -> Self {
        Self::new(connector, MatchesFeed::PreLive { filter }, sport_id, config)
    }

    pub fn live(connector: Arc<dyn FeedConnector>, sport_id: impl Into<String>, config: &FeedConfig) -> Self {
        Self::new(connector, MatchesFeed::Live, sport_id, config)
    }

    pub fn feed(&self) -> &MatchesFeed {
        &self.feed
    }

    pub fn sport_id(&self) -> &str {
        &self.sport_id
    }

    pub fn state(&self) -> ManagerState {
        self.core.state()
    }

    pub fn last_error(&self) -> Option<ServiceError> {
        self.core.last_error()
    }

    fn current_topic(&self) -> Topic {
        let size = lock_cursor(&self.cursor).page_size();
        self.feed.topic(&self.sport_id, size, self.main_markets_limit)
    }

    /// Open the feed. Repeated calls attach another observer to the same feed.
    pub fn subscribe(&self) -> LifecycleStream<Vec<Match>> {
        info!("Subscribing to {} for sport {}", self.feed.label(), self.sport_id);
        self.core.subscribe(self.current_topic())
    }

    /// Request the next, wider window.
    ///
    /// Resolves once the new snapshot has arrived: `true` if the window came
    /// back full, `false` at end of data, at the cap, while another page is
    /// loading, or if the manager is torn down meanwhile.
    pub async fn load_next_page(&self) -> Result<bool> {
        let cursor = self.cursor.clone();
        let feed = &self.feed;
        let sport_id = &self.sport_id;
        let main_markets_limit = self.main_markets_limit;

        let outcome = self
            .core
            .resubscribe(|| {
                let size = lock_cursor(&cursor).advance()?;
                info!("Loading next page of {}: window {}", feed.label(), size);
                Some(feed.topic(sport_id, size, main_markets_limit))
            })
            .await;

        match outcome {
            Resubscribe::NotSubscribed => Err(ServiceError::NotSubscribed),
            Resubscribe::Inactive => Ok(false),
            Resubscribe::Busy => {
                debug!("Page load already in progress");
                Ok(false)
            }
            Resubscribe::Declined => {
                debug!("No more pages for {}", feed.label());
                Ok(false)
            }
            Resubscribe::Pending(rx) => match rx.await {
                Ok(_) => Ok(lock_cursor(&self.cursor).has_more()),
                Err(_) => Ok(false),
            },
        }
    }

    pub fn can_load_more(&self) -> bool {
        self.core.state() != ManagerState::Unsubscribed
            && !self.core.is_paging()
            && lock_cursor(&self.cursor).can_advance()
    }

    pub fn current_page(&self) -> usize {
        lock_cursor(&self.cursor).page()
    }

    pub fn current_page_size(&self) -> usize {
        lock_cursor(&self.cursor).page_size()
    }

    pub fn current_match_count(&self) -> usize {
        self.core.with_store(|store| store.count(EntityKind::Match))
    }

    /// Matches currently held, in feed order.
    pub fn matches(&self) -> Vec<Match> {
        self.core.with_store(build_matches)
    }

    /// Main markets of this manager's sport, in feed order.
    pub fn main_markets(&self) -> Vec<MainMarket> {
        self.core
            .with_store(|store| build_main_markets(store, &self.sport_id))
    }

    pub fn betting_offer_exists(&self, id: &str) -> bool {
        self.core.betting_offer_exists(id)
    }

    pub async fn unsubscribe(&self) {
        self.core.unsubscribe().await;
    }
}

impl EntityOwner for MatchesManager {
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
