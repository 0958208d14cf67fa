//! Normalized wire records. Records reference each other by id only.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Sport,
    Match,
    Tournament,
    Location,
    EventCategory,
    Market,
    Outcome,
    BettingOffer,
    MarketOutcomeRelation,
    MainMarket,
}

impl EntityKind {
    pub fn as_wire(&self) -> &'static str {
        match self {
            EntityKind::Sport => "SPORT",
            EntityKind::Match => "MATCH",
            EntityKind::Tournament => "TOURNAMENT",
            EntityKind::Location => "LOCATION",
            EntityKind::EventCategory => "EVENT_CATEGORY",
            EntityKind::Market => "MARKET",
            EntityKind::Outcome => "OUTCOME",
            EntityKind::BettingOffer => "BETTING_OFFER",
            EntityKind::MarketOutcomeRelation => "MARKET_OUTCOME_RELATION",
            EntityKind::MainMarket => "MAIN_MARKET",
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        Some(match raw {
            "SPORT" => EntityKind::Sport,
            "MATCH" => EntityKind::Match,
            "TOURNAMENT" => EntityKind::Tournament,
            "LOCATION" => EntityKind::Location,
            "EVENT_CATEGORY" => EntityKind::EventCategory,
            "MARKET" => EntityKind::Market,
            "OUTCOME" => EntityKind::Outcome,
            "BETTING_OFFER" => EntityKind::BettingOffer,
            "MARKET_OUTCOME_RELATION" => EntityKind::MarketOutcomeRelation,
            "MAIN_MARKET" => EntityKind::MainMarket,
            _ => return None,
        })
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SportRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub is_top_sport: bool,
    #[serde(default)]
    pub number_of_events: Option<u32>,
    #[serde(default)]
    pub number_of_live_events: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub type_id: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCategoryRecord {
    pub id: String,
    pub sport_id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    pub sport_id: String,
    #[serde(default)]
    pub venue_id: Option<String>,
    #[serde(default)]
    pub number_of_events: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub start_time: Option<i64>,
    pub sport_id: String,
    /// Tournament id.
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub venue_id: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub status_id: Option<String>,
    #[serde(default)]
    pub status_name: Option<String>,
    #[serde(default)]
    pub home_participant_id: Option<String>,
    #[serde(default)]
    pub home_participant_name: Option<String>,
    #[serde(default)]
    pub away_participant_id: Option<String>,
    #[serde(default)]
    pub away_participant_name: Option<String>,
    #[serde(default)]
    pub allows_live_odds: bool,
    #[serde(default)]
    pub number_of_markets: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Match id.
    pub event_id: String,
    pub betting_type_id: String,
    #[serde(default)]
    pub betting_type_name: Option<String>,
    #[serde(default)]
    pub short_betting_type_name: Option<String>,
    #[serde(default)]
    pub event_part_id: Option<String>,
    #[serde(default)]
    pub event_part_name: Option<String>,
    #[serde(default)]
    pub param_float1: Option<f64>,
    #[serde(default)]
    pub main_line: bool,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub is_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    pub id: String,
    pub event_id: String,
    #[serde(default)]
    pub type_id: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    pub translated_name: String,
    #[serde(default)]
    pub short_translated_name: Option<String>,
    #[serde(default)]
    pub header_name_key: Option<String>,
    #[serde(default)]
    pub param_float1: Option<f64>,
    #[serde(default)]
    pub status_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BettingOfferRecord {
    pub id: String,
    pub outcome_id: String,
    #[serde(default)]
    pub betting_type_id: Option<String>,
    pub odds: f64,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub is_live: bool,
    #[serde(default)]
    pub last_changed_time: Option<i64>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub status_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOutcomeRelationRecord {
    pub id: String,
    pub market_id: String,
    pub outcome_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainMarketRecord {
    pub id: String,
    pub sport_id: String,
    pub betting_type_id: String,
    #[serde(default)]
    pub betting_type_name: Option<String>,
    #[serde(default)]
    pub event_part_id: Option<String>,
    #[serde(default)]
    pub event_part_name: Option<String>,
    #[serde(default)]
    pub number_of_outcomes: Option<u32>,
    #[serde(default)]
    pub live_market: bool,
    #[serde(default)]
    pub outright: bool,
}

/// Incremental change to a single entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub entity_type: String,
    pub id: String,
    #[serde(default)]
    pub changed_properties: Option<Map<String, Value>>,
    /// Full entity for CREATE.
    #[serde(default)]
    pub entity: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Record {
    Sport(SportRecord),
    Match(MatchRecord),
    Tournament(TournamentRecord),
    Location(LocationRecord),
    EventCategory(EventCategoryRecord),
    Market(MarketRecord),
    Outcome(OutcomeRecord),
    BettingOffer(BettingOfferRecord),
    MarketOutcomeRelation(MarketOutcomeRelationRecord),
    MainMarket(MainMarketRecord),
    Create(ChangeRecord),
    Update(ChangeRecord),
    Delete(ChangeRecord),
    #[serde(other)]
    Unknown,
}

impl Record {
    /// Entity kind, or `None` for change records and unknown types.
    pub fn kind(&self) -> Option<EntityKind> {
        Some(match self {
            Record::Sport(_) => EntityKind::Sport,
            Record::Match(_) => EntityKind::Match,
            Record::Tournament(_) => EntityKind::Tournament,
            Record::Location(_) => EntityKind::Location,
            Record::EventCategory(_) => EntityKind::EventCategory,
            Record::Market(_) => EntityKind::Market,
            Record::Outcome(_) => EntityKind::Outcome,
            Record::BettingOffer(_) => EntityKind::BettingOffer,
            Record::MarketOutcomeRelation(_) => EntityKind::MarketOutcomeRelation,
            Record::MainMarket(_) => EntityKind::MainMarket,
            Record::Create(_) | Record::Update(_) | Record::Delete(_) | Record::Unknown => {
                return None
            }
        })
    }

    pub fn id(&self) -> Option<&str> {
        Some(match self {
            Record::Sport(r) => &r.id,
            Record::Match(r) => &r.id,
            Record::Tournament(r) => &r.id,
            Record::Location(r) => &r.id,
            Record::EventCategory(r) => &r.id,
            Record::Market(r) => &r.id,
            Record::Outcome(r) => &r.id,
            Record::BettingOffer(r) => &r.id,
            Record::MarketOutcomeRelation(r) => &r.id,
            Record::MainMarket(r) => &r.id,
            Record::Create(_) | Record::Update(_) | Record::Delete(_) | Record::Unknown => {
                return None
            }
        })
    }

    pub fn is_change(&self) -> bool {
        matches!(self, Record::Create(_) | Record::Update(_) | Record::Delete(_))
    }
}

/// A stored record type with a stable id in its own namespace.
pub trait Entity: Sized {
    const KIND: EntityKind;

    fn id(&self) -> &str;
    fn from_record(record: &Record) -> Option<&Self>;
    fn into_record(self) -> Record;
}

macro_rules! impl_entity {
    ($ty:ty, $variant:ident) => {
        impl Entity for $ty {
            const KIND: EntityKind = EntityKind::$variant;

            fn id(&self) -> &str {
                &self.id
            }

            fn from_record(record: &Record) -> Option<&Self> {
                match record {
                    Record::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_record(self) -> Record {
                Record::$variant(self)
            }
        }
    };
}

impl_entity!(SportRecord, Sport);
impl_entity!(MatchRecord, Match);
impl_entity!(TournamentRecord, Tournament);
impl_entity!(LocationRecord, Location);
impl_entity!(EventCategoryRecord, EventCategory);
impl_entity!(MarketRecord, Market);
impl_entity!(OutcomeRecord, Outcome);
impl_entity!(BettingOfferRecord, BettingOffer);
impl_entity!(MarketOutcomeRelationRecord, MarketOutcomeRelation);
impl_entity!(MainMarketRecord, MainMarket);

/// Payload of one feed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorResponse {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(deserialize_with = "lenient_records")]
    pub records: Vec<Record>,
}

impl AggregatorResponse {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            version: None,
            format: None,
            message_type: None,
            records,
        }
    }
}

// One malformed record must not take the whole message down with it.
fn lenient_records<'de, D>(deserializer: D) -> Result<Vec<Record>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Record>(value) {
            Ok(record) => Some(record),
            Err(err) => {
                debug!("Skipping malformed record: {}", err);
                None
            }
        })
        .collect())
}
