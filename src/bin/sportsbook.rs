use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use sportsbook_sync::cashout::CashoutValue;
use sportsbook_sync::retry::RetryPolicy;
use sportsbook_sync::sse::SseEvent;
use sportsbook_sync::{
    AuthenticatedConnector, BettingProvider, Config, Credentials, HttpTransport, SessionCoordinator,
    TransportAuthenticator,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sportsbook")]
#[command(about = "Sportsbook session and cashout CLI", long_about = None)]
struct Cli {
    /// Path to the config file (default: ./config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print the session's user id
    Login,
    /// Show the account balance
    Balance,
    /// List open bets
    OpenBets {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Quote the current cashout value of a bet
    Cashout { bet_id: String },
    /// Follow live cashout values of a bet
    WatchCashout {
        bet_id: String,
        /// Stop after this many seconds (default: run until the stream ends)
        #[arg(short, long)]
        seconds: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::new()?,
    }
    .with_env_overrides();

    let betting = connect(&config)?;
    let username = config
        .platform
        .username
        .clone()
        .ok_or_else(|| anyhow!("no username configured"))?;
    let password = config
        .platform
        .password
        .clone()
        .ok_or_else(|| anyhow!("no password configured"))?;

    let session = betting.login(Credentials::new(username, password)).await?;
    info!("Login successful");

    let result = run(&betting, cli.command, &session.user_id).await;
    betting.logout().await?;
    result
}

fn connect(config: &Config) -> Result<BettingProvider> {
    let transport = Arc::new(HttpTransport::new(
        config.platform.base_url.clone(),
        config.request_timeout(),
    )?);
    let sessions = SessionCoordinator::new(Arc::new(TransportAuthenticator::new(transport.clone())));
    let connector = AuthenticatedConnector::new(transport, sessions)
        .with_retry_policy(RetryPolicy::new(config.retry_config()));
    Ok(BettingProvider::new(connector, config.feeds.sse_timeout()))
}

async fn run(betting: &BettingProvider, command: Commands, user_id: &str) -> Result<()> {
    match command {
        Commands::Login => {
            println!("Logged in as user {}", user_id);
        }
        Commands::Balance => {
            let balance = betting.balance().await?;
            println!("Balance: {} {}", balance.total_amount, balance.currency);
            if let Some(withdrawable) = balance.withdrawable_amount {
                println!("Withdrawable: {} {}", withdrawable, balance.currency);
            }
        }
        Commands::OpenBets { limit } => {
            let bets = betting.open_bets(limit).await?;
            if bets.is_empty() {
                println!("No open bets");
            }
            for bet in bets {
                println!(
                    "{}  {:<10} stake {}  return {}",
                    bet.id,
                    bet.status,
                    bet.stake,
                    bet.potential_return
                        .map(|value| value.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
        Commands::Cashout { bet_id } => {
            let quote = betting.calculate_cashout(&bet_id, None).await?;
            println!("Cashout value for {}: {}", bet_id, quote.value());
        }
        Commands::WatchCashout { bet_id, seconds } => {
            let watch = watch_cashout(betting, &bet_id);
            match seconds {
                Some(seconds) => match tokio::time::timeout(Duration::from_secs(seconds), watch).await {
                    Ok(result) => result?,
                    Err(_) => info!("Stopped watching after {}s", seconds),
                },
                None => watch.await?,
            }
        }
    }
    Ok(())
}

async fn watch_cashout(betting: &BettingProvider, bet_id: &str) -> Result<()> {
    let mut values = betting.subscribe_cashout_value(bet_id).await?;
    while let Some(event) = values.next().await {
        match event {
            Ok(SseEvent::Connected) => info!("Watching cashout value of {}", bet_id),
            Ok(SseEvent::Message(CashoutValue { value, .. })) => println!("{}  {}", bet_id, value),
            Ok(SseEvent::Disconnected) => {
                info!("Cashout stream closed");
                break;
            }
            Err(err) => {
                warn!("Cashout stream failed: {}", err);
                return Err(err.into());
            }
        }
    }
    Ok(())
}
