//! Cashout-value notifications filtered out of the raw SSE stream.

use futures::stream::StreamExt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sse::{SseEvent, SseStream};

pub const CASHOUT_VALUE_MESSAGE: &str = "CASHOUT_VALUE";
pub const AUTOCASHOUT_RULE_MESSAGE: &str = "AUTOCASHOUT_RULE";
/// Value is final and can be offered.
pub const CASHOUT_READY_CODE: i64 = 100;
/// Server is still computing the value.
pub const CASHOUT_COMPUTING_CODE: i64 = 103;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashoutDetails {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
}

/// Raw message as pushed on the cashout SSE endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashoutMessage {
    pub message_type: String,
    #[serde(default)]
    pub bet_id: Option<String>,
    #[serde(default)]
    pub cashout_value: Option<Decimal>,
    #[serde(default)]
    pub partial_cashout_stake: Option<Decimal>,
    #[serde(default)]
    pub details: Option<CashoutDetails>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CashoutValue {
    pub bet_id: Option<String>,
    pub value: Decimal,
    pub partial_cashout_stake: Option<Decimal>,
}

impl CashoutMessage {
    /// Accept only ready CASHOUT_VALUE messages that carry a value.
    pub fn accepted_value(&self) -> Option<CashoutValue> {
        if self.message_type != CASHOUT_VALUE_MESSAGE {
            return None;
        }
        let code = self.details.as_ref().map(|d| d.code)?;
        if code != CASHOUT_READY_CODE {
            if code == CASHOUT_COMPUTING_CODE {
                debug!("Cashout value still computing for {:?}", self.bet_id);
            }
            return None;
        }
        let value = self.cashout_value?;
        Some(CashoutValue {
            bet_id: self.bet_id.clone(),
            value,
            partial_cashout_stake: self.partial_cashout_stake,
        })
    }
}

/// Keep connection events, pass ready values, silently drop everything else.
pub fn filter_cashout_values(events: SseStream<CashoutMessage>) -> SseStream<CashoutValue> {
    events
        .filter_map(|event| async move {
            match event {
                Ok(SseEvent::Connected) => Some(Ok(SseEvent::Connected)),
                Ok(SseEvent::Disconnected) => Some(Ok(SseEvent::Disconnected)),
                Ok(SseEvent::Message(message)) => {
                    message.accepted_value().map(|value| Ok(SseEvent::Message(value)))
                }
                Err(err) => Some(Err(err)),
            }
        })
        .boxed()
}
