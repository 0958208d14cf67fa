//! Domain call sites built on the connectors and managers.

mod betting;
mod events;
mod models;

pub use betting::{BettingProvider, DEFAULT_BET_LIST_LIMIT};
pub use events::{EventsProvider, FeedKey, FeedKind};
pub use models::{Balance, Bet, BetLeg, CashoutQuote, CashoutResult, PlacedBet, SearchHit};
