//! Subscription managers. Each owns exactly one live feed and an isolated
//! entity store; nothing is shared between managers.

mod balanced;
mod feed_core;
mod matches;
mod outcome;

pub use self::balanced::BalancedMarketManager;
pub use self::feed_core::{FeedCore, FeedView, ManagerState};
pub use self::matches::{MatchesFeed, MatchesManager};
pub use self::outcome::SingleOutcomeManager;

use tokio::sync::watch;

use crate::entity::{Market, Outcome};

pub const DEFAULT_INITIAL_PAGE_SIZE: usize = 10;
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_MAIN_MARKETS_LIMIT: usize = 5;

/// Widening-window pagination state.
///
/// Page `n` requests `initial_size * n` items, capped at `max_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    page: usize,
    initial_size: usize,
    max_size: usize,
    received: usize,
    has_more: bool,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_PAGE_SIZE, DEFAULT_MAX_PAGE_SIZE)
    }
}

impl PageCursor {
    pub fn new(initial_size: usize, max_size: usize) -> Self {
        let initial_size = initial_size.max(1);
        Self {
            page: 1,
            initial_size,
            max_size: max_size.max(initial_size),
            received: 0,
            has_more: true,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        (self.initial_size * self.page).min(self.max_size)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Items in the last received window.
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn at_cap(&self) -> bool {
        self.page_size() >= self.max_size
    }

    pub fn can_advance(&self) -> bool {
        self.has_more && !self.at_cap()
    }

    /// Move to the next page and return its size, or `None` when exhausted.
    pub fn advance(&mut self) -> Option<usize> {
        if !self.can_advance() {
            return None;
        }
        self.page += 1;
        Some(self.page_size())
    }

    /// Record a received window. A short window means end of data.
    pub fn record_window(&mut self, received: usize) -> bool {
        self.received = received;
        self.has_more = received >= self.page_size();
        self.has_more
    }

    pub fn reset(&mut self) {
        self.page = 1;
        self.received = 0;
        self.has_more = true;
    }
}

/// A manager whose store may hold a given market or outcome.
///
/// Providers ask each active manager in turn and delegate per-entity
/// observation to the first owner instead of opening another feed.
pub trait EntityOwner: Send + Sync {
    fn market_exists(&self, id: &str) -> bool;
    fn outcome_exists(&self, id: &str) -> bool;
    fn subscribe_to_market_updates(&self, id: &str) -> watch::Receiver<Option<Market>>;
    fn subscribe_to_outcome_updates(&self, id: &str) -> watch::Receiver<Option<Outcome>>;
}

pub fn find_market_owner<'a, I>(owners: I, market_id: &str) -> Option<&'a dyn EntityOwner>
where
    I: IntoIterator<Item = &'a dyn EntityOwner>,
{
    owners.into_iter().find(|owner| owner.market_exists(market_id))
}

pub fn find_outcome_owner<'a, I>(owners: I, outcome_id: &str) -> Option<&'a dyn EntityOwner>
where
    I: IntoIterator<Item = &'a dyn EntityOwner>,
{
    owners.into_iter().find(|owner| owner.outcome_exists(outcome_id))
}
