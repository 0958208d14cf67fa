mod common;

use common::{
    matches_snapshot, next_state, odds_update, offer, priced_match, settle, ScriptedFeedConnector,
};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use sportsbook_sync::config::FeedConfig;
use sportsbook_sync::entity::Match;
use sportsbook_sync::feed::{FeedEvent, Topic};
use sportsbook_sync::lifecycle::{SubscriptionContent, SubscriptionHandle};
use sportsbook_sync::managers::{EntityOwner, ManagerState, MatchesManager, SingleOutcomeManager};
use sportsbook_sync::ServiceError;
use std::sync::Arc;

fn feed_config(initial: usize, max: usize) -> FeedConfig {
    FeedConfig {
        initial_page_size: initial,
        max_page_size: max,
        ..FeedConfig::default()
    }
}

fn match_ids(matches: &[Match]) -> Vec<String> {
    matches.iter().map(|m| m.id.clone()).collect()
}

#[tokio::test]
async fn test_lifecycle_is_delivered_in_order() {
    let feeds = Arc::new(ScriptedFeedConnector::new());
    let manager = MatchesManager::pre_live(feeds.clone(), "1", None, &feed_config(10, 100));

    let mut states = manager.subscribe();
    assert_eq!(next_state(&mut states).await, SubscriptionContent::Connecting);

    feeds.wait_for_subscriptions(1).await;
    feeds.send_connect(0, "h1");
    feeds.send_initial(0, matches_snapshot("1", 3));
    feeds.send_update(0, vec![odds_update("missing", 2.0), offer("bo9", "o9", 3.0)]);

    assert_eq!(
        next_state(&mut states).await,
        SubscriptionContent::Connected(SubscriptionHandle::new("h1"))
    );
    match next_state(&mut states).await {
        SubscriptionContent::InitialContent(matches) => {
            assert_eq!(match_ids(&matches), vec!["m0", "m1", "m2"]);
            assert_eq!(matches[0].tournament.as_ref().unwrap().name, "League");
            assert_eq!(matches[0].sport.as_ref().unwrap().name, "Football");
        }
        other => panic!("expected initial content, got {:?}", other),
    }
    assert!(matches!(
        next_state(&mut states).await,
        SubscriptionContent::UpdatedContent(_)
    ));
    assert_eq!(manager.state(), ManagerState::Active);

    manager.unsubscribe().await;
    assert_eq!(next_state(&mut states).await, SubscriptionContent::Disconnected);
    assert_eq!(states.next().await, None);
    assert_eq!(feeds.released(), vec![SubscriptionHandle::new("h1")]);
}

#[tokio::test]
async fn test_topic_depends_on_filter() {
    let feeds = Arc::new(ScriptedFeedConnector::new());
    let config = feed_config(10, 100);

    let popular = MatchesManager::pre_live(feeds.clone(), "1", None, &config);
    let _popular_states = popular.subscribe();
    feeds.wait_for_subscriptions(1).await;

    let live = MatchesManager::live(feeds.clone(), "1", &config);
    let _live_states = live.subscribe();
    feeds.wait_for_subscriptions(2).await;

    let topics = feeds.topics();
    assert!(matches!(topics[0], Topic::PopularMatches { event_limit: 10, .. }));
    assert!(matches!(topics[1], Topic::LiveMatches { event_limit: 10, .. }));

    popular.unsubscribe().await;
    live.unsubscribe().await;
}

#[tokio::test]
async fn test_load_next_page_before_subscribe_fails() {
    let feeds = Arc::new(ScriptedFeedConnector::new());
    let manager = MatchesManager::pre_live(feeds.clone(), "1", None, &feed_config(10, 100));

    let result = manager.load_next_page().await;
    assert_eq!(result.unwrap_err(), ServiceError::NotSubscribed);
    assert_eq!(feeds.subscription_count(), 0);
}

#[tokio::test]
async fn test_pages_widen_the_window() {
    let feeds = Arc::new(ScriptedFeedConnector::new());
    let manager = Arc::new(MatchesManager::pre_live(
        feeds.clone(),
        "1",
        None,
        &feed_config(10, 100),
    ));
    let mut states = manager.subscribe();
    feeds.wait_for_subscriptions(1).await;
    feeds.send_connect(0, "h1");
    feeds.send_initial(0, matches_snapshot("1", 10));
    settle().await;
    assert_eq!(manager.current_match_count(), 10);

    for page in 1..=3usize {
        let loader = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.load_next_page().await })
        };
        feeds.wait_for_subscriptions(page + 1).await;
        let window = 10 * (page + 1);
        feeds.send_connect(page, &format!("h{}", page + 1));
        feeds.send_initial(page, matches_snapshot("1", window));

        assert!(loader.await.unwrap().unwrap());
        assert_eq!(manager.current_page_size(), window);
        assert_eq!(manager.current_match_count(), window);
    }

    let limits: Vec<_> = feeds
        .topics()
        .iter()
        .map(|topic| topic.event_limit().unwrap())
        .collect();
    assert_eq!(limits, vec![10, 20, 30, 40]);

    // Every replaced subscription was released.
    assert_eq!(
        feeds.released(),
        vec![
            SubscriptionHandle::new("h1"),
            SubscriptionHandle::new("h2"),
            SubscriptionHandle::new("h3"),
        ]
    );

    // Observers see one fresh snapshot per window, never a partial one.
    let mut snapshots = Vec::new();
    while snapshots.len() < 4 {
        if let SubscriptionContent::InitialContent(matches) = next_state(&mut states).await {
            snapshots.push(matches.len());
        }
    }
    assert_eq!(snapshots, vec![10, 20, 30, 40]);

    manager.unsubscribe().await;
}

#[tokio::test]
async fn test_short_window_ends_paging() {
    let feeds = Arc::new(ScriptedFeedConnector::new());
    let manager = Arc::new(MatchesManager::pre_live(
        feeds.clone(),
        "1",
        None,
        &feed_config(10, 100),
    ));
    let _states = manager.subscribe();
    feeds.wait_for_subscriptions(1).await;
    feeds.send_connect(0, "h1");
    feeds.send_initial(0, matches_snapshot("1", 10));
    settle().await;

    let loader = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.load_next_page().await })
    };
    feeds.wait_for_subscriptions(2).await;
    feeds.send_initial(1, matches_snapshot("1", 14));

    assert!(!loader.await.unwrap().unwrap());
    assert!(!manager.can_load_more());
    assert!(!manager.load_next_page().await.unwrap());
    assert_eq!(feeds.subscription_count(), 2);

    manager.unsubscribe().await;
}

#[tokio::test]
async fn test_page_size_stops_at_cap() {
    let feeds = Arc::new(ScriptedFeedConnector::new());
    let manager = Arc::new(MatchesManager::pre_live(
        feeds.clone(),
        "1",
        None,
        &feed_config(10, 20),
    ));
    let _states = manager.subscribe();
    feeds.wait_for_subscriptions(1).await;
    feeds.send_initial(0, matches_snapshot("1", 10));
    settle().await;

    let loader = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.load_next_page().await })
    };
    feeds.wait_for_subscriptions(2).await;
    feeds.send_initial(1, matches_snapshot("1", 20));
    assert!(loader.await.unwrap().unwrap());

    assert!(!manager.load_next_page().await.unwrap());
    assert_eq!(feeds.subscription_count(), 2);
    assert_eq!(manager.current_page_size(), 20);

    manager.unsubscribe().await;
}

#[tokio::test]
async fn test_concurrent_page_request_is_declined() {
    let feeds = Arc::new(ScriptedFeedConnector::new());
    let manager = Arc::new(MatchesManager::pre_live(
        feeds.clone(),
        "1",
        None,
        &feed_config(10, 100),
    ));
    let _states = manager.subscribe();
    feeds.wait_for_subscriptions(1).await;
    feeds.send_initial(0, matches_snapshot("1", 10));
    settle().await;

    let first = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.load_next_page().await })
    };
    feeds.wait_for_subscriptions(2).await;

    assert!(!manager.load_next_page().await.unwrap());
    assert_eq!(feeds.subscription_count(), 2);

    feeds.send_initial(1, matches_snapshot("1", 20));
    assert!(first.await.unwrap().unwrap());

    manager.unsubscribe().await;
}

#[tokio::test]
async fn test_unsubscribe_during_page_load_resolves_false() {
    let feeds = Arc::new(ScriptedFeedConnector::new());
    let manager = Arc::new(MatchesManager::pre_live(
        feeds.clone(),
        "1",
        None,
        &feed_config(10, 100),
    ));
    let _states = manager.subscribe();
    feeds.wait_for_subscriptions(1).await;
    feeds.send_initial(0, matches_snapshot("1", 10));
    settle().await;

    let loader = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.load_next_page().await })
    };
    feeds.wait_for_subscriptions(2).await;
    manager.unsubscribe().await;

    assert!(!loader.await.unwrap().unwrap());
    assert_eq!(manager.state(), ManagerState::Unsubscribed);
    assert!(!manager.load_next_page().await.unwrap());
}

#[tokio::test]
async fn test_late_events_after_unsubscribe_are_ignored() {
    let feeds = Arc::new(ScriptedFeedConnector::new());
    let manager = MatchesManager::pre_live(feeds.clone(), "1", None, &feed_config(10, 100));
    let states = manager.subscribe();
    feeds.wait_for_subscriptions(1).await;
    feeds.send_connect(0, "h1");
    feeds.send_initial(0, matches_snapshot("1", 2));
    settle().await;

    manager.unsubscribe().await;
    feeds.send_initial(0, matches_snapshot("1", 5));
    feeds.send_update(0, vec![offer("bo1", "o1", 1.5)]);
    settle().await;

    assert_eq!(manager.current_match_count(), 2);
    assert!(!manager.betting_offer_exists("bo1"));
    let delivered: Vec<_> = states.collect().await;
    assert_eq!(delivered.last(), Some(&SubscriptionContent::Disconnected));
    assert_eq!(
        delivered
            .iter()
            .filter(|state| matches!(state, SubscriptionContent::InitialContent(_)))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_server_disconnect_ends_the_feed() {
    let feeds = Arc::new(ScriptedFeedConnector::new());
    let manager = MatchesManager::live(feeds.clone(), "1", &feed_config(10, 100));
    let mut states = manager.subscribe();
    feeds.wait_for_subscriptions(1).await;
    feeds.send_connect(0, "h1");
    feeds.send(0, Ok(FeedEvent::Disconnect));

    assert_eq!(next_state(&mut states).await, SubscriptionContent::Connecting);
    assert!(matches!(
        next_state(&mut states).await,
        SubscriptionContent::Connected(_)
    ));
    assert_eq!(next_state(&mut states).await, SubscriptionContent::Disconnected);
    assert_eq!(manager.state(), ManagerState::Unsubscribed);

    // A later subscriber only learns that the feed is gone.
    let mut late = manager.subscribe();
    assert_eq!(next_state(&mut late).await, SubscriptionContent::Disconnected);
    assert_eq!(feeds.subscription_count(), 1);
}

#[tokio::test]
async fn test_feed_error_is_recorded() {
    let feeds = Arc::new(ScriptedFeedConnector::new());
    let manager = MatchesManager::live(feeds.clone(), "1", &feed_config(10, 100));
    let mut states = manager.subscribe();
    feeds.wait_for_subscriptions(1).await;
    feeds.send(0, Err(ServiceError::NoNetworkConnection));

    assert_eq!(next_state(&mut states).await, SubscriptionContent::Connecting);
    assert_eq!(next_state(&mut states).await, SubscriptionContent::Disconnected);
    assert_eq!(manager.last_error(), Some(ServiceError::NoNetworkConnection));
}

#[tokio::test]
async fn test_outcome_observer_sees_odds_changes() {
    let feeds = Arc::new(ScriptedFeedConnector::new());
    let manager = MatchesManager::pre_live(feeds.clone(), "1", None, &feed_config(10, 100));
    let _states = manager.subscribe();
    feeds.wait_for_subscriptions(1).await;
    feeds.send_initial(0, priced_match("m1", "1"));
    settle().await;

    assert!(manager.outcome_exists("o1"));
    assert!(manager.market_exists("mk1"));
    assert!(manager.betting_offer_exists("bo1"));

    let mut outcome = manager.subscribe_to_outcome_updates("o1");
    assert_eq!(outcome.borrow_and_update().as_ref().unwrap().odds(), Some(1.85));

    let mut market = manager.subscribe_to_market_updates("mk1");
    assert_eq!(market.borrow_and_update().as_ref().unwrap().outcomes.len(), 2);

    feeds.send_update(0, vec![odds_update("bo1", 1.95)]);
    tokio::time::timeout(common::WAIT, outcome.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.borrow_and_update().as_ref().unwrap().odds(), Some(1.95));
    market.borrow_and_update();

    // Untouched siblings do not wake the outcome observer.
    feeds.send_update(0, vec![odds_update("bo2", 2.5)]);
    tokio::time::timeout(common::WAIT, market.changed())
        .await
        .unwrap()
        .unwrap();
    assert!(!outcome.has_changed().unwrap());

    manager.unsubscribe().await;
}

#[tokio::test]
async fn test_single_outcome_manager_follows_its_offer() {
    let feeds = Arc::new(ScriptedFeedConnector::new());
    let manager = SingleOutcomeManager::new(feeds.clone(), "o1", "bo1");
    let mut states = manager.subscribe();
    feeds.wait_for_subscriptions(1).await;

    assert_eq!(
        feeds.topics()[0],
        Topic::BettingOffer {
            betting_offer_id: "bo1".to_string()
        }
    );
    assert!(manager.outcome_exists("o1"));

    feeds.send_connect(0, "h1");
    feeds.send_initial(0, priced_match("m1", "1"));
    feeds.send_update(0, vec![odds_update("bo1", 2.0)]);

    assert_eq!(next_state(&mut states).await, SubscriptionContent::Connecting);
    assert!(matches!(
        next_state(&mut states).await,
        SubscriptionContent::Connected(_)
    ));
    match next_state(&mut states).await {
        SubscriptionContent::InitialContent(Some(outcome)) => assert_eq!(outcome.odds(), Some(1.85)),
        other => panic!("unexpected state {:?}", other),
    }
    match next_state(&mut states).await {
        SubscriptionContent::UpdatedContent(Some(outcome)) => assert_eq!(outcome.odds(), Some(2.0)),
        other => panic!("unexpected state {:?}", other),
    }
    assert_eq!(manager.betting_offer().unwrap().odds, 2.0);

    manager.unsubscribe().await;
    manager.unsubscribe().await;
    assert_eq!(feeds.released().len(), 1);
}

#[tokio::test]
async fn test_ended_single_outcome_manager_owns_nothing() {
    let feeds = Arc::new(ScriptedFeedConnector::new());
    let manager = SingleOutcomeManager::new(feeds.clone(), "o1", "bo1");
    let mut states = manager.subscribe();
    feeds.wait_for_subscriptions(1).await;
    feeds.send_initial(0, priced_match("m1", "1"));
    feeds.send(0, Ok(FeedEvent::Disconnect));

    let delivered: Vec<_> = (&mut states).collect().await;
    assert_eq!(delivered.last(), Some(&SubscriptionContent::Disconnected));
    assert_eq!(manager.state(), ManagerState::Unsubscribed);
    assert!(!manager.outcome_exists("o1"));
    assert!(!manager.outcome_exists("o2"));
    assert!(!manager.market_exists("mk1"));
}
