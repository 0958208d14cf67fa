use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Default header carrying the session id when no override exists.
pub const DEFAULT_SESSION_HEADER: &str = "X-SessionId";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    pub fn is_idempotent(&self) -> bool {
        matches!(self, Method::Get | Method::Put | Method::Delete)
    }
}

/// Which credential a header carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    SessionId,
    UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    Login,
    Logout,
    Balance,
    PlaceBet,
    OpenBets,
    SettledBets,
    CalculateCashout,
    ExecuteCashout,
    CashoutValueStream,
    Search,
}

/// Typed REST and SSE operations exposed by the wagering platform.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    Login {
        username: String,
        password: String,
    },
    Logout,
    Balance,
    PlaceBet {
        selections: Vec<BetSelection>,
        stake: Decimal,
        bet_type: String,
    },
    OpenBets {
        limit: usize,
    },
    SettledBets {
        limit: usize,
    },
    CalculateCashout {
        bet_id: String,
        stake_value: Option<Decimal>,
    },
    ExecuteCashout {
        bet_id: String,
        cashout_value: Decimal,
        stake_value: Option<Decimal>,
    },
    CashoutValueStream {
        bet_id: String,
    },
    Search {
        query: String,
        language: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BetSelection {
    pub event_id: String,
    pub outcome_id: String,
    pub betting_offer_id: String,
    pub odds: f64,
}

impl Endpoint {
    pub fn kind(&self) -> EndpointKind {
        match self {
            Endpoint::Login { .. } => EndpointKind::Login,
            Endpoint::Logout => EndpointKind::Logout,
            Endpoint::Balance => EndpointKind::Balance,
            Endpoint::PlaceBet { .. } => EndpointKind::PlaceBet,
            Endpoint::OpenBets { .. } => EndpointKind::OpenBets,
            Endpoint::SettledBets { .. } => EndpointKind::SettledBets,
            Endpoint::CalculateCashout { .. } => EndpointKind::CalculateCashout,
            Endpoint::ExecuteCashout { .. } => EndpointKind::ExecuteCashout,
            Endpoint::CashoutValueStream { .. } => EndpointKind::CashoutValueStream,
            Endpoint::Search { .. } => EndpointKind::Search,
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Endpoint::Login { .. }
            | Endpoint::PlaceBet { .. }
            | Endpoint::CalculateCashout { .. }
            | Endpoint::ExecuteCashout { .. } => Method::Post,
            Endpoint::Logout => Method::Delete,
            _ => Method::Get,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Endpoint::Login { .. } => "/v1/player/login".to_string(),
            Endpoint::Logout => "/v1/player/session".to_string(),
            Endpoint::Balance => "/v2/player/balance".to_string(),
            Endpoint::PlaceBet { .. } => "/v2/betting/place-bet".to_string(),
            Endpoint::OpenBets { .. } => "/v2/betting/bets/open".to_string(),
            Endpoint::SettledBets { .. } => "/v2/betting/bets/settled".to_string(),
            Endpoint::CalculateCashout { .. } => "/v2/cashout/calculate".to_string(),
            Endpoint::ExecuteCashout { .. } => "/v2/cashout/execute".to_string(),
            Endpoint::CashoutValueStream { .. } => "/v2/cashout/value-updates".to_string(),
            Endpoint::Search { .. } => "/v1/sports/search".to_string(),
        }
    }

    pub fn query(&self) -> Vec<(String, String)> {
        match self {
            Endpoint::OpenBets { limit } | Endpoint::SettledBets { limit } => {
                vec![("limit".to_string(), limit.to_string())]
            }
            Endpoint::CashoutValueStream { bet_id } => {
                vec![("betIds".to_string(), bet_id.clone())]
            }
            Endpoint::Search { query, language } => vec![
                ("query".to_string(), query.clone()),
                ("lang".to_string(), language.clone()),
            ],
            _ => Vec::new(),
        }
    }

    pub fn body(&self) -> Option<Value> {
        match self {
            Endpoint::Login { username, password } => Some(json!({
                "username": username,
                "password": password,
            })),
            Endpoint::PlaceBet {
                selections,
                stake,
                bet_type,
            } => Some(json!({
                "type": bet_type,
                "stakeAmount": stake,
                "selections": selections
                    .iter()
                    .map(|s| json!({
                        "eventId": s.event_id,
                        "outcomeId": s.outcome_id,
                        "bettingOfferId": s.betting_offer_id,
                        "priceValue": s.odds,
                    }))
                    .collect::<Vec<_>>(),
            })),
            Endpoint::CalculateCashout { bet_id, stake_value } => Some(json!({
                "betId": bet_id,
                "cashoutStakeValue": stake_value,
            })),
            Endpoint::ExecuteCashout {
                bet_id,
                cashout_value,
                stake_value,
            } => Some(json!({
                "betId": bet_id,
                "cashoutValue": cashout_value,
                "cashoutStakeValue": stake_value,
            })),
            _ => None,
        }
    }

    pub fn requires_session(&self) -> bool {
        !matches!(self, Endpoint::Login { .. } | Endpoint::Search { .. })
    }
}

/// Explicit `(endpoint, credential) -> header name` table.
///
/// Session ids fall back to [`DEFAULT_SESSION_HEADER`]; user ids are only
/// attached where the table has an entry.
#[derive(Debug, Clone)]
pub struct AuthHeaderTable {
    entries: HashMap<(EndpointKind, CredentialKind), String>,
}

impl AuthHeaderTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn with(mut self, kind: EndpointKind, credential: CredentialKind, header: &str) -> Self {
        self.entries.insert((kind, credential), header.to_string());
        self
    }

    pub fn lookup(&self, kind: EndpointKind, credential: CredentialKind) -> Option<&str> {
        self.entries.get(&(kind, credential)).map(String::as_str)
    }

    /// Header name for the session id of this endpoint.
    pub fn session_header(&self, kind: EndpointKind) -> &str {
        self.lookup(kind, CredentialKind::SessionId)
            .unwrap_or(DEFAULT_SESSION_HEADER)
    }

    pub fn user_header(&self, kind: EndpointKind) -> Option<&str> {
        self.lookup(kind, CredentialKind::UserId)
    }

    /// Headers to attach for `kind` given a session.
    pub fn headers_for(&self, kind: EndpointKind, session_id: &str, user_id: &str) -> Vec<(String, String)> {
        let mut headers = vec![(self.session_header(kind).to_string(), session_id.to_string())];
        if let Some(user_header) = self.user_header(kind) {
            headers.push((user_header.to_string(), user_id.to_string()));
        }
        headers
    }
}

impl Default for AuthHeaderTable {
    fn default() -> Self {
        Self::empty()
            .with(EndpointKind::PlaceBet, CredentialKind::UserId, "userId")
            .with(EndpointKind::OpenBets, CredentialKind::UserId, "userId")
            .with(EndpointKind::SettledBets, CredentialKind::UserId, "userId")
            .with(EndpointKind::CalculateCashout, CredentialKind::UserId, "userId")
            .with(EndpointKind::ExecuteCashout, CredentialKind::UserId, "userId")
            .with(EndpointKind::CashoutValueStream, CredentialKind::UserId, "userId")
            .with(EndpointKind::CashoutValueStream, CredentialKind::SessionId, "x-session-id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_session_header() {
        let table = AuthHeaderTable::default();
        assert_eq!(table.session_header(EndpointKind::Balance), DEFAULT_SESSION_HEADER);
        assert_eq!(table.session_header(EndpointKind::CashoutValueStream), "x-session-id");
    }

    #[test]
    fn test_user_header_only_when_mapped() {
        let table = AuthHeaderTable::default();
        assert!(table.user_header(EndpointKind::Balance).is_none());
        assert_eq!(table.user_header(EndpointKind::PlaceBet), Some("userId"));

        let headers = table.headers_for(EndpointKind::Balance, "sid", "42");
        assert_eq!(headers, vec![("X-SessionId".to_string(), "sid".to_string())]);

        let headers = table.headers_for(EndpointKind::OpenBets, "sid", "42");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[1], ("userId".to_string(), "42".to_string()));
    }

    #[test]
    fn test_login_needs_no_session() {
        let login = Endpoint::Login {
            username: "u".to_string(),
            password: "p".to_string(),
        };
        assert!(!login.requires_session());
        assert_eq!(login.method(), Method::Post);
        assert!(Endpoint::Balance.requires_session());
    }

    #[test]
    fn test_cashout_body() {
        let endpoint = Endpoint::ExecuteCashout {
            bet_id: "b1".to_string(),
            cashout_value: dec!(12.5),
            stake_value: None,
        };
        let body = endpoint.body().unwrap();
        assert_eq!(body["betId"], "b1");
        assert!(body["cashoutStakeValue"].is_null());
    }
}
