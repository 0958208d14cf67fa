#![allow(dead_code)]

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use sportsbook_sync::entity::{AggregatorResponse, Record};
use sportsbook_sync::error::{Result, ServiceError};
use sportsbook_sync::feed::{FeedConnector, FeedEvent, FeedStream, Topic};
use sportsbook_sync::lifecycle::{LifecycleStream, SubscriptionContent, SubscriptionHandle};
use sportsbook_sync::session::{Authenticator, Credentials, Session};
use sportsbook_sync::transport::{ByteStream, HttpRequest, Transport};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(2);

/// Counts logins and hands out `sid-<n>` sessions for user 42.
#[derive(Default)]
pub struct FakeAuthenticator {
    logins: AtomicUsize,
    delay: Option<Duration>,
    fail_next: AtomicBool,
}

impl FakeAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn fail_next_login(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Authenticator for FakeAuthenticator {
    async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ServiceError::Unauthorized);
        }
        Ok(Session {
            session_id: format!("sid-{}", n),
            user_id: if credentials.username.is_empty() {
                "0".to_string()
            } else {
                "42".to_string()
            },
        })
    }
}

/// Transport that replays queued responses and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Vec<u8>>>>,
    streams: Mutex<VecDeque<Result<Vec<String>>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&self, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(serde_json::to_vec(&body).unwrap()));
    }

    pub fn push_error(&self, err: ServiceError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn push_stream(&self, chunks: Vec<&str>) {
        self.streams
            .lock()
            .unwrap()
            .push_back(Ok(chunks.into_iter().map(String::from).collect()));
    }

    pub fn push_stream_error(&self, err: ServiceError) {
        self.streams.lock().unwrap().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ServiceError::NotFound))
    }

    async fn open_stream(&self, request: &HttpRequest) -> Result<ByteStream> {
        self.requests.lock().unwrap().push(request.clone());
        let chunks = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ServiceError::NotFound))?;
        Ok(stream::iter(chunks.into_iter().map(|chunk| Ok(chunk.into_bytes()))).boxed())
    }
}

/// Feed connector whose streams are driven by the test.
#[derive(Default)]
pub struct ScriptedFeedConnector {
    topics: Mutex<Vec<Topic>>,
    senders: Mutex<Vec<mpsc::UnboundedSender<Result<FeedEvent>>>>,
    released: Mutex<Vec<SubscriptionHandle>>,
}

impl ScriptedFeedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.topics.lock().unwrap().clone()
    }

    pub fn released(&self) -> Vec<SubscriptionHandle> {
        self.released.lock().unwrap().clone()
    }

    pub fn subscription_count(&self) -> usize {
        self.senders.lock().unwrap().len()
    }

    /// Wait until the `n`th subscription has been opened.
    pub async fn wait_for_subscriptions(&self, n: usize) {
        tokio::time::timeout(WAIT, async {
            while self.subscription_count() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscription was never opened");
    }

    /// Push an event into subscription `index` (0-based, in open order).
    ///
    /// Events sent after the manager dropped its stream are lost.
    pub fn send(&self, index: usize, event: Result<FeedEvent>) {
        let senders = self.senders.lock().unwrap();
        let _ = senders[index].unbounded_send(event);
    }

    pub fn send_connect(&self, index: usize, handle: &str) {
        self.send(index, Ok(FeedEvent::Connect(SubscriptionHandle::new(handle))));
    }

    pub fn send_initial(&self, index: usize, records: Vec<Record>) {
        self.send(index, Ok(FeedEvent::InitialContent(AggregatorResponse::new(records))));
    }

    pub fn send_update(&self, index: usize, records: Vec<Record>) {
        self.send(index, Ok(FeedEvent::UpdatedContent(AggregatorResponse::new(records))));
    }
}

#[async_trait]
impl FeedConnector for ScriptedFeedConnector {
    async fn subscribe(&self, topic: Topic) -> Result<FeedStream> {
        let (tx, rx) = mpsc::unbounded();
        self.topics.lock().unwrap().push(topic);
        self.senders.lock().unwrap().push(tx);
        Ok(rx.boxed())
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<()> {
        self.released.lock().unwrap().push(handle.clone());
        Ok(())
    }
}

pub async fn next_state<T>(stream: &mut LifecycleStream<T>) -> SubscriptionContent<T> {
    tokio::time::timeout(WAIT, stream.next())
        .await
        .expect("timed out waiting for lifecycle state")
        .expect("lifecycle stream ended")
}

/// Let spawned feed tasks drain what has been sent so far.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub fn record(value: Value) -> Record {
    serde_json::from_value(value).unwrap()
}

pub fn sport(id: &str, name: &str) -> Record {
    record(json!({"_type": "SPORT", "id": id, "name": name}))
}

pub fn tournament(id: &str, sport_id: &str, name: &str) -> Record {
    record(json!({"_type": "TOURNAMENT", "id": id, "sportId": sport_id, "name": name}))
}

pub fn match_record(id: &str, sport_id: &str, tournament_id: &str) -> Record {
    record(json!({
        "_type": "MATCH",
        "id": id,
        "name": format!("Home {} - Away {}", id, id),
        "sportId": sport_id,
        "parentId": tournament_id,
        "startTime": 1_700_000_000_000i64,
        "homeParticipantName": format!("Home {}", id),
        "awayParticipantName": format!("Away {}", id),
    }))
}

pub fn market(id: &str, match_id: &str, betting_type_id: &str, main_line: bool) -> Record {
    record(json!({
        "_type": "MARKET",
        "id": id,
        "name": format!("Market {}", id),
        "eventId": match_id,
        "bettingTypeId": betting_type_id,
        "mainLine": main_line,
    }))
}

pub fn outcome(id: &str, match_id: &str, name: &str) -> Record {
    record(json!({
        "_type": "OUTCOME",
        "id": id,
        "eventId": match_id,
        "translatedName": name,
    }))
}

pub fn relation(market_id: &str, outcome_id: &str) -> Record {
    record(json!({
        "_type": "MARKET_OUTCOME_RELATION",
        "id": format!("{}-{}", market_id, outcome_id),
        "marketId": market_id,
        "outcomeId": outcome_id,
    }))
}

pub fn offer(id: &str, outcome_id: &str, odds: f64) -> Record {
    record(json!({
        "_type": "BETTING_OFFER",
        "id": id,
        "outcomeId": outcome_id,
        "odds": odds,
    }))
}

pub fn odds_update(offer_id: &str, odds: f64) -> Record {
    record(json!({
        "_type": "UPDATE",
        "entityType": "BETTING_OFFER",
        "id": offer_id,
        "changedProperties": {"odds": odds},
    }))
}

pub fn delete(entity_type: &str, id: &str) -> Record {
    record(json!({"_type": "DELETE", "entityType": entity_type, "id": id}))
}

/// A sport with `count` matches in one tournament, `m0..m{count-1}`.
pub fn matches_snapshot(sport_id: &str, count: usize) -> Vec<Record> {
    let mut records = vec![sport(sport_id, "Football"), tournament("t1", sport_id, "League")];
    for i in 0..count {
        records.push(match_record(&format!("m{}", i), sport_id, "t1"));
    }
    records
}

/// One match with a 1X2 market: outcome `o1` priced by offer `bo1`.
pub fn priced_match(match_id: &str, sport_id: &str) -> Vec<Record> {
    vec![
        sport(sport_id, "Football"),
        tournament("t1", sport_id, "League"),
        match_record(match_id, sport_id, "t1"),
        market("mk1", match_id, "69", true),
        outcome("o1", match_id, "Home"),
        outcome("o2", match_id, "Away"),
        relation("mk1", "o1"),
        relation("mk1", "o2"),
        offer("bo1", "o1", 1.85),
        offer("bo2", "o2", 2.10),
    ]
}
