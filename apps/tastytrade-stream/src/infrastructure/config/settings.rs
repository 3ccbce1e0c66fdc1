//! Client Configuration Settings
//!
//! Configuration for the streaming client, loaded from environment
//! variables. All durations accept whole seconds.
//!
//! # Environment Variables
//!
//! - `TT_BASE_URL`: venue REST base URL
//! - `TT_STREAMER_URL`: account stream WebSocket URL
//! - `TT_INTERMEDIARY_URL`: delegated-token intermediary base URL
//! - `TT_LOGIN` / `TT_PASSWORD`: venue credentials
//! - `TT_ACCOUNT_NUMBER`: account to stream updates for
//! - `TT_REFRESH_SECRET`: long-lived delegated-token refresh secret
//! - `TT_BROKERAGE`: brokerage identifier for the intermediary
//! - `TT_ACCOUNT_HEARTBEAT_SECS` / `TT_FEED_KEEPALIVE_SECS`: timer overrides
//! - `TT_CONNECT_TIMEOUT_SECS` / `TT_HANDSHAKE_TIMEOUT_SECS`: handshake bounds

use std::time::Duration;

use crate::infrastructure::dxlink::client::DxLinkConfig;
use crate::infrastructure::tastytrade::account::AccountStreamConfig;
use crate::infrastructure::tastytrade::auth::AuthConfig;

/// Default venue REST base URL.
const DEFAULT_BASE_URL: &str = "https://api.tastyworks.com";

/// Default account stream URL.
const DEFAULT_STREAMER_URL: &str = "wss://streamer.tastyworks.com";

/// Default delegated-token intermediary URL.
const DEFAULT_INTERMEDIARY_URL: &str = "https://vast.tastyworks.com";

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing or empty.
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
}

/// Full client configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Venue REST base URL.
    pub base_url: String,
    /// Account stream WebSocket URL.
    pub streamer_url: String,
    /// Delegated-token intermediary base URL.
    pub intermediary_url: String,
    /// Venue login.
    pub login: String,
    /// Venue password.
    pub password: String,
    /// Account to stream updates for.
    pub account_number: String,
    /// Long-lived delegated-token refresh secret.
    pub refresh_secret: String,
    /// Brokerage identifier for the intermediary.
    pub brokerage: String,
    /// Account stream heartbeat interval.
    pub account_heartbeat_interval: Duration,
    /// Account stream connect handshake bound.
    pub account_connect_timeout: Duration,
    /// Feed keep-alive interval.
    pub feed_keepalive_interval: Duration,
    /// Feed per-step handshake bound.
    pub feed_handshake_timeout: Duration,
}

impl Settings {
    /// Load settings from the environment, with `.env` support.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] for any absent credential.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            base_url: env_or("TT_BASE_URL", DEFAULT_BASE_URL),
            streamer_url: env_or("TT_STREAMER_URL", DEFAULT_STREAMER_URL),
            intermediary_url: env_or("TT_INTERMEDIARY_URL", DEFAULT_INTERMEDIARY_URL),
            login: env_required("TT_LOGIN")?,
            password: env_required("TT_PASSWORD")?,
            account_number: env_required("TT_ACCOUNT_NUMBER")?,
            refresh_secret: std::env::var("TT_REFRESH_SECRET").unwrap_or_default(),
            brokerage: env_or("TT_BROKERAGE", "tastytrade"),
            account_heartbeat_interval: env_secs(
                "TT_ACCOUNT_HEARTBEAT_SECS",
                crate::infrastructure::tastytrade::account::DEFAULT_HEARTBEAT_INTERVAL,
            ),
            account_connect_timeout: env_secs(
                "TT_CONNECT_TIMEOUT_SECS",
                crate::infrastructure::tastytrade::account::DEFAULT_CONNECT_TIMEOUT,
            ),
            feed_keepalive_interval: env_secs(
                "TT_FEED_KEEPALIVE_SECS",
                crate::infrastructure::dxlink::client::DEFAULT_KEEPALIVE_INTERVAL,
            ),
            feed_handshake_timeout: env_secs(
                "TT_HANDSHAKE_TIMEOUT_SECS",
                crate::infrastructure::dxlink::client::DEFAULT_HANDSHAKE_TIMEOUT,
            ),
        })
    }

    /// Auth configuration for the token store.
    #[must_use]
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            base_url: self.base_url.clone(),
            login: self.login.clone(),
            password: self.password.clone(),
            intermediary_url: self.intermediary_url.clone(),
            refresh_secret: self.refresh_secret.clone(),
            account_number: self.account_number.clone(),
            brokerage: self.brokerage.clone(),
        }
    }

    /// Account stream session configuration.
    #[must_use]
    pub fn account_stream_config(&self) -> AccountStreamConfig {
        AccountStreamConfig {
            url: self.streamer_url.clone(),
            account_number: self.account_number.clone(),
            connect_timeout: self.account_connect_timeout,
            heartbeat_interval: self.account_heartbeat_interval,
        }
    }

    /// Feed session configuration.
    #[must_use]
    pub fn dxlink_config(&self) -> DxLinkConfig {
        DxLinkConfig {
            handshake_timeout: self.feed_handshake_timeout,
            keepalive_interval: self.feed_keepalive_interval,
            ..DxLinkConfig::default()
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

fn env_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}
