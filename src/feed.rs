//! Live-feed boundary.
//!
//! The router that actually carries feed messages is external; managers only
//! need to open a [`Topic`], read [`FeedEvent`]s and release the handle.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::config::PlatformConfig;
use crate::entity::AggregatorResponse;
use crate::error::Result;
use crate::lifecycle::SubscriptionHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortBy {
    #[default]
    Popular,
    Upcoming,
    Favorites,
}

impl SortBy {
    pub fn as_wire(&self) -> &'static str {
        match self {
            SortBy::Popular => "POPULAR",
            SortBy::Upcoming => "UPCOMING",
            SortBy::Favorites => "FAVORITES",
        }
    }
}

/// Narrowing of the pre-live match list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MatchFilter {
    pub location_id: Option<String>,
    pub tournament_id: Option<String>,
    /// Hours ahead to include, e.g. `"0-24"`.
    pub hours_interval: Option<String>,
    pub sort_by: SortBy,
    pub user_id: Option<String>,
}

impl MatchFilter {
    fn segment(value: &Option<String>) -> &str {
        value.as_deref().unwrap_or("all")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    PopularMatches {
        sport_id: String,
        event_limit: usize,
        main_markets_limit: usize,
    },
    CustomMatches {
        sport_id: String,
        filter: MatchFilter,
        event_limit: usize,
        main_markets_limit: usize,
    },
    LiveMatches {
        sport_id: String,
        event_limit: usize,
        main_markets_limit: usize,
    },
    BettingOffer {
        betting_offer_id: String,
    },
    BalancedMarketOdds {
        match_id: String,
        betting_type_id: String,
        event_part_id: String,
    },
}

impl Topic {
    pub fn event_limit(&self) -> Option<usize> {
        match self {
            Topic::PopularMatches { event_limit, .. }
            | Topic::CustomMatches { event_limit, .. }
            | Topic::LiveMatches { event_limit, .. } => Some(*event_limit),
            Topic::BettingOffer { .. } | Topic::BalancedMarketOdds { .. } => None,
        }
    }

    /// Router path for this topic.
    pub fn path(&self, operator_id: &str, language: &str) -> String {
        let prefix = format!("/sports/{}/{}", operator_id, language);
        match self {
            Topic::PopularMatches {
                sport_id,
                event_limit,
                main_markets_limit,
            } => format!(
                "{}/popular-matches-aggregator-main/{}/{}/{}",
                prefix, sport_id, event_limit, main_markets_limit
            ),
            Topic::CustomMatches {
                sport_id,
                filter,
                event_limit,
                main_markets_limit,
            } => {
                let mut path = format!(
                    "{}/custom-matches-aggregator/{}/{}/{}/{}/{}/NOT_LIVE/{}/{}",
                    prefix,
                    sport_id,
                    MatchFilter::segment(&filter.location_id),
                    MatchFilter::segment(&filter.tournament_id),
                    MatchFilter::segment(&filter.hours_interval),
                    filter.sort_by.as_wire(),
                    event_limit,
                    main_markets_limit
                );
                if let Some(user_id) = &filter.user_id {
                    path.push('/');
                    path.push_str(user_id);
                }
                path
            }
            Topic::LiveMatches {
                sport_id,
                event_limit,
                main_markets_limit,
            } => format!(
                "{}/live-matches-aggregator-main/{}/all-locations/default-event-info/{}/{}",
                prefix, sport_id, event_limit, main_markets_limit
            ),
            Topic::BettingOffer { betting_offer_id } => {
                format!("{}/bettingOffers/{}", prefix, betting_offer_id)
            }
            Topic::BalancedMarketOdds {
                match_id,
                betting_type_id,
                event_part_id,
            } => format!(
                "{}/{}/match-odds/{}-{}",
                prefix, match_id, betting_type_id, event_part_id
            ),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::PopularMatches { sport_id, event_limit, .. } => {
                write!(f, "popular-matches[{}; {}]", sport_id, event_limit)
            }
            Topic::CustomMatches { sport_id, event_limit, .. } => {
                write!(f, "custom-matches[{}; {}]", sport_id, event_limit)
            }
            Topic::LiveMatches { sport_id, event_limit, .. } => {
                write!(f, "live-matches[{}; {}]", sport_id, event_limit)
            }
            Topic::BettingOffer { betting_offer_id } => write!(f, "betting-offer[{}]", betting_offer_id),
            Topic::BalancedMarketOdds { match_id, betting_type_id, .. } => {
                write!(f, "balanced-market[{}; {}]", match_id, betting_type_id)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Connect(SubscriptionHandle),
    InitialContent(AggregatorResponse),
    UpdatedContent(AggregatorResponse),
    Disconnect,
}

pub type FeedStream = BoxStream<'static, Result<FeedEvent>>;

#[async_trait]
pub trait FeedConnector: Send + Sync {
    /// Register a topic and stream its events.
    async fn subscribe(&self, topic: Topic) -> Result<FeedStream>;

    /// Release a server-side registration.
    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<()>;
}

/// Path-addressed router that carries the feed messages.
#[async_trait]
pub trait FeedRouter: Send + Sync {
    async fn subscribe(&self, path: &str) -> Result<FeedStream>;

    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<()>;
}

/// Opens topics on a [`FeedRouter`] under one operator and language.
pub struct RoutedFeeds {
    router: Arc<dyn FeedRouter>,
    operator_id: String,
    language: String,
}

impl RoutedFeeds {
    pub fn new(
        router: Arc<dyn FeedRouter>,
        operator_id: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            router,
            operator_id: operator_id.into(),
            language: language.into(),
        }
    }

    pub fn from_config(router: Arc<dyn FeedRouter>, platform: &PlatformConfig) -> Self {
        Self::new(router, platform.operator_id.clone(), platform.language.clone())
    }

    pub fn path(&self, topic: &Topic) -> String {
        topic.path(&self.operator_id, &self.language)
    }
}

#[async_trait]
impl FeedConnector for RoutedFeeds {
    async fn subscribe(&self, topic: Topic) -> Result<FeedStream> {
        let path = self.path(&topic);
        debug!("Opening {} at {}", topic, path);
        self.router.subscribe(&path).await
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<()> {
        self.router.unsubscribe(handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_paths() {
        let popular = Topic::PopularMatches {
            sport_id: "1".to_string(),
            event_limit: 20,
            main_markets_limit: 5,
        };
        assert_eq!(
            popular.path("4093", "en"),
            "/sports/4093/en/popular-matches-aggregator-main/1/20/5"
        );
        assert_eq!(popular.event_limit(), Some(20));

        let custom = Topic::CustomMatches {
            sport_id: "1".to_string(),
            filter: MatchFilter {
                tournament_id: Some("t9".to_string()),
                sort_by: SortBy::Upcoming,
                ..Default::default()
            },
            event_limit: 10,
            main_markets_limit: 5,
        };
        assert_eq!(
            custom.path("4093", "en"),
            "/sports/4093/en/custom-matches-aggregator/1/all/t9/all/UPCOMING/NOT_LIVE/10/5"
        );

        let balanced = Topic::BalancedMarketOdds {
            match_id: "m1".to_string(),
            betting_type_id: "69".to_string(),
            event_part_id: "3".to_string(),
        };
        assert_eq!(balanced.path("4093", "en"), "/sports/4093/en/m1/match-odds/69-3");
        assert_eq!(balanced.event_limit(), None);
    }
}
