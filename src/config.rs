use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::retry::RetryConfig;

pub const USERNAME_ENV: &str = "SPORTSBOOK_USERNAME";
pub const PASSWORD_ENV: &str = "SPORTSBOOK_PASSWORD";

#[derive(Clone, Deserialize)]
pub struct PlatformConfig {
    pub base_url: String,
    pub operator_id: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// Credentials stay out of log output.
impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("base_url", &self.base_url)
            .field("operator_id", &self.operator_id)
            .field("language", &self.language)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_initial_page_size")]
    pub initial_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    #[serde(default = "default_main_markets_limit")]
    pub main_markets_limit: usize,
    #[serde(default = "default_sse_timeout_secs")]
    pub sse_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            initial_page_size: default_initial_page_size(),
            max_page_size: default_max_page_size(),
            main_markets_limit: default_main_markets_limit(),
            sse_timeout_secs: default_sse_timeout_secs(),
        }
    }
}

impl FeedConfig {
    pub fn sse_timeout(&self) -> Duration {
        Duration::from_secs(self.sse_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl From<&RetrySection> for RetryConfig {
    fn from(section: &RetrySection) -> Self {
        RetryConfig {
            max_attempts: section.max_attempts,
            initial_delay: Duration::from_millis(section.initial_delay_ms),
            max_delay: Duration::from_millis(section.max_delay_ms),
            multiplier: section.multiplier,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub platform: PlatformConfig,
    #[serde(default)]
    pub feeds: FeedConfig,
    #[serde(default)]
    pub retry: Option<RetrySection>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_initial_page_size() -> usize {
    10
}

fn default_max_page_size() -> usize {
    100
}

fn default_main_markets_limit() -> usize {
    5
}

fn default_sse_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Load `config.toml` from the working directory.
    pub fn new() -> Result<Self> {
        Self::from_path("config.toml")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let config_str = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&config_str)?;
        info!("Config: {:?}", config);
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        if config.feeds.initial_page_size == 0 {
            return Err(anyhow::anyhow!("feeds.initial_page_size must be positive"));
        }
        if config.feeds.max_page_size < config.feeds.initial_page_size {
            return Err(anyhow::anyhow!(
                "feeds.max_page_size ({}) is below feeds.initial_page_size ({})",
                config.feeds.max_page_size,
                config.feeds.initial_page_size
            ));
        }
        Ok(config)
    }

    /// Credentials from the environment take precedence over the file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(username) = std::env::var(USERNAME_ENV) {
            self.platform.username = Some(username);
        }
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            self.platform.password = Some(password);
        }
        self
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry.as_ref().map(RetryConfig::from).unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.platform.request_timeout_secs)
    }
}
