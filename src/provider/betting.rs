use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::models::{Balance, Bet, BetList, CashoutQuote, CashoutResult, PlacedBet};
use crate::cashout::{filter_cashout_values, CashoutMessage, CashoutValue};
use crate::connector::AuthenticatedConnector;
use crate::endpoint::{BetSelection, Endpoint};
use crate::error::{Result, ServiceError};
use crate::session::{Credentials, Session};
use crate::sse::SseStream;

pub const DEFAULT_BET_LIST_LIMIT: usize = 50;

/// Account, bet placement and cashout calls.
#[derive(Clone)]
pub struct BettingProvider {
    connector: AuthenticatedConnector,
    sse_timeout: Duration,
}

impl BettingProvider {
    pub fn new(connector: AuthenticatedConnector, sse_timeout: Duration) -> Self {
        Self {
            connector,
            sse_timeout,
        }
    }

    pub fn connector(&self) -> &AuthenticatedConnector {
        &self.connector
    }

    pub async fn login(&self, credentials: Credentials) -> Result<Session> {
        info!("Logging in as {}", credentials.username);
        self.connector.sessions().login(credentials).await
    }

    /// End the server session if there is one, then forget it locally.
    pub async fn logout(&self) -> Result<()> {
        if self.connector.sessions().current_session().is_some() {
            if let Err(err) = self.connector.execute_raw(&Endpoint::Logout).await {
                warn!("Server logout failed: {}", err);
            }
        }
        self.connector.sessions().clear_session();
        info!("Logged out");
        Ok(())
    }

    pub async fn balance(&self) -> Result<Balance> {
        self.connector.execute(&Endpoint::Balance).await
    }

    pub async fn place_bet(
        &self,
        selections: Vec<BetSelection>,
        stake: Decimal,
        bet_type: impl Into<String>,
    ) -> Result<PlacedBet> {
        if selections.is_empty() || stake <= Decimal::ZERO {
            return Err(ServiceError::InvalidRequestFormat);
        }
        let endpoint = Endpoint::PlaceBet {
            selections,
            stake,
            bet_type: bet_type.into(),
        };
        let placed: PlacedBet = self.connector.execute(&endpoint).await?;
        info!("Placed bet {} ({})", placed.bet_id, placed.status);
        Ok(placed)
    }

    /// Open bets, or an empty list before anyone has logged in.
    pub async fn open_bets(&self, limit: usize) -> Result<Vec<Bet>> {
        if self.connector.sessions().current_session().is_none() {
            debug!("No session yet, returning no open bets");
            return Ok(Vec::new());
        }
        let list: BetList = self.connector.execute(&Endpoint::OpenBets { limit }).await?;
        Ok(list.bets)
    }

    pub async fn settled_bets(&self, limit: usize) -> Result<Vec<Bet>> {
        if self.connector.sessions().current_session().is_none() {
            return Ok(Vec::new());
        }
        let list: BetList = self
            .connector
            .execute(&Endpoint::SettledBets { limit })
            .await?;
        Ok(list.bets)
    }

    pub async fn calculate_cashout(&self, bet_id: &str, stake_value: Option<Decimal>) -> Result<CashoutQuote> {
        self.connector
            .execute(&Endpoint::CalculateCashout {
                bet_id: bet_id.to_string(),
                stake_value,
            })
            .await
    }

    pub async fn execute_cashout(
        &self,
        bet_id: &str,
        cashout_value: Decimal,
        stake_value: Option<Decimal>,
    ) -> Result<CashoutResult> {
        let result: CashoutResult = self
            .connector
            .execute(&Endpoint::ExecuteCashout {
                bet_id: bet_id.to_string(),
                cashout_value,
                stake_value,
            })
            .await?;
        if !result.success {
            if let Some(message) = &result.error_message {
                warn!("Cashout of {} rejected: {}", bet_id, message);
            }
        }
        Ok(result)
    }

    /// Live cashout values for one bet; intermediate states are filtered out.
    pub async fn subscribe_cashout_value(&self, bet_id: &str) -> Result<SseStream<CashoutValue>> {
        let endpoint = Endpoint::CashoutValueStream {
            bet_id: bet_id.to_string(),
        };
        let raw = self
            .connector
            .execute_stream::<CashoutMessage>(&endpoint, self.sse_timeout)
            .await?;
        Ok(filter_cashout_values(raw))
    }
}
