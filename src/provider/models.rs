//! Response bodies of the betting REST endpoints.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub total_amount: Decimal,
    #[serde(default)]
    pub withdrawable_amount: Option<Decimal>,
    #[serde(default)]
    pub bonus_amount: Option<Decimal>,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedBet {
    pub bet_id: String,
    pub status: String,
    pub total_stake: Decimal,
    #[serde(default)]
    pub potential_return: Option<Decimal>,
    #[serde(default)]
    pub total_odds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetLeg {
    pub event_id: String,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub market_name: Option<String>,
    pub outcome_id: String,
    #[serde(default)]
    pub outcome_name: Option<String>,
    pub odds: f64,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub bet_type: Option<String>,
    pub stake: Decimal,
    #[serde(default)]
    pub potential_return: Option<Decimal>,
    #[serde(default)]
    pub total_odds: Option<f64>,
    #[serde(default)]
    pub placed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cashout_value: Option<Decimal>,
    #[serde(default)]
    pub selections: Vec<BetLeg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BetList {
    #[serde(default)]
    pub bets: Vec<Bet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashoutQuote {
    #[serde(default)]
    pub cashout_value: Option<Decimal>,
    /// Set when a partial stake was requested.
    #[serde(default)]
    pub partial_cashout_stake: Option<Decimal>,
}

impl CashoutQuote {
    pub fn value(&self) -> Decimal {
        self.cashout_value.unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashoutResult {
    #[serde(default)]
    pub success: bool,
    /// Re-offered value when the requested one was stale.
    #[serde(default)]
    pub cashout_value: Option<Decimal>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub event_id: String,
    pub name: String,
    #[serde(default)]
    pub sport_id: Option<String>,
    #[serde(default)]
    pub tournament_name: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_live: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchResults {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}
