//! Domain objects rebuilt from the [`EntityStore`] on every read.
//!
//! Builders never fail: a reference missing from the store leaves the
//! corresponding field empty.

use chrono::{DateTime, Utc};

use super::records::{
    BettingOfferRecord, EventCategoryRecord, LocationRecord, MainMarketRecord, MarketOutcomeRelationRecord,
    MarketRecord, MatchRecord, OutcomeRecord, SportRecord, TournamentRecord,
};
use super::store::EntityStore;

#[derive(Debug, Clone, PartialEq)]
pub struct Sport {
    pub id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub is_virtual: bool,
    pub is_top_sport: bool,
    pub number_of_events: Option<u32>,
    pub number_of_live_events: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventCategory {
    pub id: String,
    pub sport_id: String,
    pub name: String,
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tournament {
    pub id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub sport: Option<Sport>,
    pub venue: Option<Location>,
    pub number_of_events: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchStatus {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub sport: Option<Sport>,
    pub tournament: Option<Tournament>,
    pub venue: Option<Location>,
    pub category: Option<EventCategory>,
    pub home: Option<Participant>,
    pub away: Option<Participant>,
    pub status: Option<MatchStatus>,
    pub allows_live_odds: bool,
    pub markets: Vec<Market>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BettingType {
    pub id: String,
    pub name: Option<String>,
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    pub id: String,
    pub event_id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub display_name: Option<String>,
    pub betting_type: BettingType,
    pub event_part_name: Option<String>,
    pub line: Option<f64>,
    pub is_main_line: bool,
    pub is_available: bool,
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub id: String,
    pub event_id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub code: Option<String>,
    pub header_name_key: Option<String>,
    pub line: Option<f64>,
    pub betting_offers: Vec<BettingOffer>,
}

impl Outcome {
    /// First available offer, which is what a betslip would use.
    pub fn primary_offer(&self) -> Option<&BettingOffer> {
        self.betting_offers.iter().find(|offer| offer.is_available)
    }

    pub fn odds(&self) -> Option<f64> {
        self.primary_offer().map(|offer| offer.odds)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BettingOffer {
    pub id: String,
    pub outcome_id: String,
    pub odds: f64,
    pub is_available: bool,
    pub is_live: bool,
    pub last_changed: Option<DateTime<Utc>>,
    pub provider_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MainMarket {
    pub id: String,
    pub sport_id: String,
    pub betting_type_id: String,
    pub betting_type_name: Option<String>,
    pub event_part_id: Option<String>,
    pub number_of_outcomes: Option<u32>,
    pub live_market: bool,
    pub outright: bool,
}

fn timestamp(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::<Utc>::from_timestamp_millis)
}

/// Builds one domain type from its root record.
pub trait DomainBuilder {
    type Source;
    type Output;

    fn build(source: &Self::Source, store: &EntityStore) -> Self::Output;
}

pub struct SportBuilder;

impl DomainBuilder for SportBuilder {
    type Source = SportRecord;
    type Output = Sport;

    fn build(source: &SportRecord, _store: &EntityStore) -> Sport {
        Sport {
            id: source.id.clone(),
            name: source.name.clone(),
            short_name: source.short_name.clone(),
            is_virtual: source.is_virtual,
            is_top_sport: source.is_top_sport,
            number_of_events: source.number_of_events,
            number_of_live_events: source.number_of_live_events,
        }
    }
}

pub struct LocationBuilder;

impl DomainBuilder for LocationBuilder {
    type Source = LocationRecord;
    type Output = Location;

    fn build(source: &LocationRecord, _store: &EntityStore) -> Location {
        Location {
            id: source.id.clone(),
            name: source.name.clone(),
            short_name: source.short_name.clone(),
            code: source.code.clone(),
        }
    }
}

pub struct EventCategoryBuilder;

impl DomainBuilder for EventCategoryBuilder {
    type Source = EventCategoryRecord;
    type Output = EventCategory;

    fn build(source: &EventCategoryRecord, _store: &EntityStore) -> EventCategory {
        EventCategory {
            id: source.id.clone(),
            sport_id: source.sport_id.clone(),
            name: source.name.clone(),
            short_name: source.short_name.clone(),
        }
    }
}

pub struct TournamentBuilder;

impl DomainBuilder for TournamentBuilder {
    type Source = TournamentRecord;
    type Output = Tournament;

    fn build(source: &TournamentRecord, store: &EntityStore) -> Tournament {
        Tournament {
            id: source.id.clone(),
            name: source.name.clone(),
            short_name: source.short_name.clone(),
            sport: resolve::<SportBuilder>(store, Some(source.sport_id.as_str())),
            venue: resolve::<LocationBuilder>(store, source.venue_id.as_deref()),
            number_of_events: source.number_of_events,
        }
    }
}

pub struct BettingOfferBuilder;

impl DomainBuilder for BettingOfferBuilder {
    type Source = BettingOfferRecord;
    type Output = BettingOffer;

    fn build(source: &BettingOfferRecord, _store: &EntityStore) -> BettingOffer {
        BettingOffer {
            id: source.id.clone(),
            outcome_id: source.outcome_id.clone(),
            odds: source.odds,
            is_available: source.is_available,
            is_live: source.is_live,
            last_changed: timestamp(source.last_changed_time),
            provider_id: source.provider_id.clone(),
        }
    }
}

pub struct OutcomeBuilder;

impl DomainBuilder for OutcomeBuilder {
    type Source = OutcomeRecord;
    type Output = Outcome;

    fn build(source: &OutcomeRecord, store: &EntityStore) -> Outcome {
        let betting_offers = store
            .iter::<BettingOfferRecord>()
            .filter(|offer| offer.outcome_id == source.id)
            .map(|offer| BettingOfferBuilder::build(offer, store))
            .collect();

        Outcome {
            id: source.id.clone(),
            event_id: source.event_id.clone(),
            name: source.translated_name.clone(),
            short_name: source.short_translated_name.clone(),
            code: source.code.clone(),
            header_name_key: source.header_name_key.clone(),
            line: source.param_float1,
            betting_offers,
        }
    }
}

pub struct MarketBuilder;

impl DomainBuilder for MarketBuilder {
    type Source = MarketRecord;
    type Output = Market;

    fn build(source: &MarketRecord, store: &EntityStore) -> Market {
        let outcomes = store
            .iter::<MarketOutcomeRelationRecord>()
            .filter(|relation| relation.market_id == source.id)
            .filter_map(|relation| store.get::<OutcomeRecord>(&relation.outcome_id))
            .map(|outcome| OutcomeBuilder::build(outcome, store))
            .collect();

        Market {
            id: source.id.clone(),
            event_id: source.event_id.clone(),
            name: source.name.clone(),
            short_name: source.short_name.clone(),
            display_name: source.display_name.clone(),
            betting_type: BettingType {
                id: source.betting_type_id.clone(),
                name: source.betting_type_name.clone(),
                short_name: source.short_betting_type_name.clone(),
            },
            event_part_name: source.event_part_name.clone(),
            line: source.param_float1,
            is_main_line: source.main_line,
            is_available: source.is_available && !source.is_closed,
            outcomes,
        }
    }
}

pub struct MatchBuilder;

impl DomainBuilder for MatchBuilder {
    type Source = MatchRecord;
    type Output = Match;

    fn build(source: &MatchRecord, store: &EntityStore) -> Match {
        let markets = store
            .iter::<MarketRecord>()
            .filter(|market| market.event_id == source.id)
            .map(|market| MarketBuilder::build(market, store))
            .collect();

        let participant = |id: &Option<String>, name: &Option<String>| {
            name.as_ref().map(|name| Participant {
                id: id.clone(),
                name: name.clone(),
            })
        };

        Match {
            id: source.id.clone(),
            name: source.name.clone(),
            short_name: source.short_name.clone(),
            start_time: timestamp(source.start_time),
            sport: resolve::<SportBuilder>(store, Some(source.sport_id.as_str())),
            tournament: resolve::<TournamentBuilder>(store, source.parent_id.as_deref()),
            venue: resolve::<LocationBuilder>(store, source.venue_id.as_deref()),
            category: resolve::<EventCategoryBuilder>(store, source.category_id.as_deref()),
            home: participant(&source.home_participant_id, &source.home_participant_name),
            away: participant(&source.away_participant_id, &source.away_participant_name),
            status: source.status_id.as_ref().map(|id| MatchStatus {
                id: id.clone(),
                name: source.status_name.clone(),
            }),
            allows_live_odds: source.allows_live_odds,
            markets,
        }
    }
}

pub struct MainMarketBuilder;

impl DomainBuilder for MainMarketBuilder {
    type Source = MainMarketRecord;
    type Output = MainMarket;

    fn build(source: &MainMarketRecord, _store: &EntityStore) -> MainMarket {
        MainMarket {
            id: source.id.clone(),
            sport_id: source.sport_id.clone(),
            betting_type_id: source.betting_type_id.clone(),
            betting_type_name: source.betting_type_name.clone(),
            event_part_id: source.event_part_id.clone(),
            number_of_outcomes: source.number_of_outcomes,
            live_market: source.live_market,
            outright: source.outright,
        }
    }
}

fn resolve<B>(store: &EntityStore, id: Option<&str>) -> Option<B::Output>
where
    B: DomainBuilder,
    B::Source: super::records::Entity,
{
    let source = store.get::<B::Source>(id?)?;
    Some(B::build(source, store))
}

/// Every stored match, in insertion order.
pub fn build_matches(store: &EntityStore) -> Vec<Match> {
    store
        .iter::<MatchRecord>()
        .map(|record| MatchBuilder::build(record, store))
        .collect()
}

pub fn build_match(store: &EntityStore, id: &str) -> Option<Match> {
    resolve::<MatchBuilder>(store, Some(id))
}

pub fn build_market(store: &EntityStore, id: &str) -> Option<Market> {
    resolve::<MarketBuilder>(store, Some(id))
}

pub fn build_outcome(store: &EntityStore, id: &str) -> Option<Outcome> {
    resolve::<OutcomeBuilder>(store, Some(id))
}

pub fn build_sports(store: &EntityStore) -> Vec<Sport> {
    store
        .iter::<SportRecord>()
        .map(|record| SportBuilder::build(record, store))
        .collect()
}

/// Main markets for one sport, in insertion order.
pub fn build_main_markets(store: &EntityStore, sport_id: &str) -> Vec<MainMarket> {
    store
        .iter::<MainMarketRecord>()
        .filter(|record| record.sport_id == sport_id)
        .map(|record| MainMarketBuilder::build(record, store))
        .collect()
}

/// Id of the outcome a betting offer belongs to.
pub fn outcome_of_offer<'a>(store: &'a EntityStore, offer_id: &str) -> Option<&'a str> {
    store
        .get::<BettingOfferRecord>(offer_id)
        .map(|offer| offer.outcome_id.as_str())
}

/// Id of the market an outcome belongs to.
pub fn market_of_outcome<'a>(store: &'a EntityStore, outcome_id: &str) -> Option<&'a str> {
    store
        .iter::<MarketOutcomeRelationRecord>()
        .find(|relation| relation.outcome_id == outcome_id)
        .map(|relation| relation.market_id.as_str())
}
