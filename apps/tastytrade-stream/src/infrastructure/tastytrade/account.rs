//! Account Stream Session
//!
//! Socket session for the venue's account stream. The handshake is a single
//! step: send a connect frame scoped to one account and wait for the
//! correlated status response. Heartbeats carry the current session
//! credential and a fresh request id every tick.
//!
//! Inbound account-update frames (order events, balance changes) are
//! dispatched raw to the session's listener registry; their structured
//! interpretation belongs to the hosting engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::auth::TokenStore;
use super::messages::{ConnectFrame, HeartbeatFrame, StatusResponse};
use crate::infrastructure::socket::{Handshake, SessionError, SessionProtocol, SocketSession};

/// Default bound for the connect handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Configuration for the account stream session.
#[derive(Debug, Clone)]
pub struct AccountStreamConfig {
    /// Account stream WebSocket URL.
    pub url: String,
    /// Account to subscribe updates for.
    pub account_number: String,
    /// Bound for the connect handshake.
    pub connect_timeout: Duration,
    /// Interval between heartbeat frames.
    pub heartbeat_interval: Duration,
}

impl AccountStreamConfig {
    /// Create a configuration with default timeouts.
    pub fn new(url: impl Into<String>, account_number: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            account_number: account_number.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

/// Protocol implementation for the account stream.
pub struct AccountStreamProtocol {
    config: AccountStreamConfig,
    store: Arc<TokenStore>,
    request_id: AtomicU64,
}

impl AccountStreamProtocol {
    /// Create the protocol. Performs no I/O.
    #[must_use]
    pub fn new(config: AccountStreamConfig, store: Arc<TokenStore>) -> Self {
        Self {
            config,
            store,
            request_id: AtomicU64::new(1),
        }
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl SessionProtocol for AccountStreamProtocol {
    fn name(&self) -> &'static str {
        "account-stream"
    }

    async fn endpoint(&self) -> Result<String, SessionError> {
        Ok(self.config.url.clone())
    }

    fn handshake_timeout(&self) -> Duration {
        self.config.connect_timeout
    }

    async fn handshake(&self, handshake: &mut Handshake<'_>) -> Result<(), SessionError> {
        let credential = self.store.session_token().await?;
        let request_id = self.next_request_id();

        let frame = ConnectFrame::new(&self.config.account_number, credential.value(), request_id);
        handshake.send(serde_json::to_string(&frame)?).await?;

        loop {
            let text = handshake.expect_text("connect").await?;
            let Ok(response) = serde_json::from_str::<StatusResponse>(&text) else {
                // Not a status frame; keep waiting for the correlated response.
                continue;
            };
            if response.request_id != Some(request_id) {
                continue;
            }
            if response.is_ok() {
                tracing::debug!(
                    session_id = response.web_socket_session_id.as_deref().unwrap_or(""),
                    "account stream connected"
                );
                return Ok(());
            }
            return Err(SessionError::HandshakeDenied {
                status: response.status,
                message: response.message.unwrap_or_default(),
            });
        }
    }

    fn keepalive_interval(&self) -> Duration {
        self.config.heartbeat_interval
    }

    async fn keepalive_frame(&self) -> Result<String, SessionError> {
        let credential = self.store.session_token().await?;
        let frame = HeartbeatFrame::new(credential.value(), self.next_request_id());
        Ok(serde_json::to_string(&frame)?)
    }
}

/// The account stream session type.
pub type AccountStreamSession = SocketSession<AccountStreamProtocol>;

impl AccountStreamSession {
    /// Build an account stream session.
    #[must_use]
    pub fn account_stream(config: AccountStreamConfig, store: Arc<TokenStore>) -> Self {
        Self::new(AccountStreamProtocol::new(config, store))
    }
}
