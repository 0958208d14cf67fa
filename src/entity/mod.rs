//! Normalized records, the per-feed [`EntityStore`] and the builders that
//! turn stored records back into domain objects.

pub mod builders;
pub mod records;
pub mod store;

pub use builders::{
    build_main_markets, build_market, build_match, build_matches, build_outcome, build_sports, BettingOffer,
    BettingType, DomainBuilder, EventCategory, Location, MainMarket, Market, Match, MatchStatus, Outcome,
    Participant, Sport, Tournament,
};
pub use records::{AggregatorResponse, ChangeRecord, Entity, EntityKind, Record};
pub use store::{EntityKey, EntityStore};
