//! # sportsbook-sync
//!
//! Session and realtime-sync layer for a sportsbook client: authenticates
//! against the wagering platform, keeps live views of matches, markets and
//! odds in per-feed entity stores, and delivers filtered push streams such as
//! cashout values.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sportsbook_sync::{
//!     AuthenticatedConnector, BettingProvider, Config, Credentials, HttpTransport,
//!     SessionCoordinator, TransportAuthenticator,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::new()?.with_env_overrides();
//! let transport = Arc::new(HttpTransport::new(
//!     config.platform.base_url.clone(),
//!     config.request_timeout(),
//! )?);
//!
//! let sessions = SessionCoordinator::new(Arc::new(TransportAuthenticator::new(transport.clone())));
//! let connector = AuthenticatedConnector::new(transport, sessions);
//! let betting = BettingProvider::new(connector, config.feeds.sse_timeout());
//!
//! betting.login(Credentials::new("user", "secret")).await?;
//! let balance = betting.balance().await?;
//! println!("{} {}", balance.total_amount, balance.currency);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Session coordination**: concurrent callers share a single login per refresh
//! - **Transparent reauthentication**: one forced refresh and one retry on 401/403
//! - **Entity store**: normalized records rebuilt into match/market/outcome graphs
//! - **Paginated live feeds**: widening windows with race-free teardown
//! - **Cashout streaming**: SSE values gated by message type and status code
//!
//! ## Configuration
//!
//! ```toml
//! [platform]
//! base_url = "https://sports-api.example.com"
//! operator_id = "4093"
//! username = "your_username"
//! password = "your_password"
//!
//! [feeds]
//! initial_page_size = 10
//! max_page_size = 100
//! ```

pub mod cashout;
pub mod config;
pub mod connection_state;
pub mod connector;
pub mod endpoint;
pub mod entity;
pub mod error;
pub mod feed;
pub mod lifecycle;
pub mod managers;
pub mod provider;
pub mod retry;
pub mod session;
pub mod sse;
pub mod transport;

pub use config::Config;
pub use connector::{AuthenticatedConnector, TransportAuthenticator};
pub use error::{Result, ServiceError};
pub use feed::{FeedConnector, FeedRouter, RoutedFeeds};
pub use lifecycle::{SubscriptionContent, SubscriptionHandle};
pub use provider::{BettingProvider, EventsProvider};
pub use session::{Authenticator, Credentials, Session, SessionCoordinator};
pub use transport::{HttpTransport, Transport};
