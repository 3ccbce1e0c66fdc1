//! tastytrade Wire Types
//!
//! Serialization schema for the venue's REST API and account stream. This
//! surface uses kebab-case field names throughout; it is deliberately kept
//! separate from the dxLink schema (camelCase, SCREAMING discriminators) in
//! `infrastructure::dxlink::messages`.
//!
//! # Wire Format
//!
//! ```json
//! POST /sessions {"login":"u","password":"p","remember-me":true}
//!   -> {"session-token":"...","remember-token":"...","session-expiration":"..."}
//! ```
//!
//! Account stream frames:
//!
//! ```json
//! {"action":"connect","value":["5WT00000"],"auth-token":"...","request-id":1}
//! {"status":"ok","action":"connect","web-socket-session-id":"...","request-id":1}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// REST Bodies
// =============================================================================

/// Body of `POST /sessions` for both login and refresh.
///
/// A full login carries `password`; a refresh carries the rotated
/// `remember-token` from the previous response instead.
#[derive(Debug, Serialize)]
pub struct SessionRequest<'a> {
    /// Venue login (username or email).
    pub login: &'a str,

    /// Account password; present only on a full login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,

    /// Rotated refresh artifact; present only on a refresh.
    #[serde(rename = "remember-token", skip_serializing_if = "Option::is_none")]
    pub remember_token: Option<&'a str>,

    /// Request a remember token in the response.
    #[serde(rename = "remember-me")]
    pub remember_me: bool,
}

/// Response of `POST /sessions`.
#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    /// The venue session token.
    #[serde(rename = "session-token")]
    pub session_token: String,

    /// Rotated refresh artifact; replaces any previously issued one.
    #[serde(rename = "remember-token")]
    pub remember_token: Option<String>,

    /// Server-declared session expiry.
    #[serde(rename = "session-expiration")]
    pub session_expiration: DateTime<Utc>,
}

/// Body of the delegated-token refresh call to the trusted intermediary.
#[derive(Debug, Serialize)]
pub struct DelegatedTokenRequest<'a> {
    /// Brokerage identifier.
    pub brokerage: &'a str,

    /// Long-lived refresh secret.
    #[serde(rename = "refresh-token")]
    pub refresh_token: &'a str,

    /// Account the delegated token is scoped to.
    #[serde(rename = "account-number")]
    pub account_number: &'a str,
}

/// Response of the delegated-token refresh call.
#[derive(Debug, Deserialize)]
pub struct DelegatedTokenResponse {
    /// The bearer token value.
    #[serde(rename = "access-token")]
    pub access_token: String,

    /// Token scheme, expected `"Bearer"`.
    #[serde(rename = "token-type")]
    pub token_type: String,

    /// Seconds until the token expires.
    #[serde(rename = "expires-in")]
    pub expires_in: i64,
}

/// Response of `GET /api-quote-tokens`.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteTokenResponse {
    /// dxLink WebSocket endpoint to connect to.
    #[serde(rename = "dxlink-url")]
    pub dxlink_url: String,

    /// Data entitlement level, e.g. `"api"` or `"delayed"`.
    pub level: String,

    /// The feed authorization token, valid 24 hours.
    pub token: String,
}

// =============================================================================
// Account Stream Frames
// =============================================================================

/// Account stream connect frame, scoped to one account.
#[derive(Debug, Serialize)]
pub struct ConnectFrame<'a> {
    /// Always `"connect"`.
    pub action: &'static str,

    /// Account numbers to subscribe; exactly one here.
    pub value: Vec<&'a str>,

    /// Current session token.
    #[serde(rename = "auth-token")]
    pub auth_token: &'a str,

    /// Correlates the server's response with this frame.
    #[serde(rename = "request-id")]
    pub request_id: u64,
}

impl<'a> ConnectFrame<'a> {
    /// Build a connect frame for one account.
    #[must_use]
    pub fn new(account_number: &'a str, auth_token: &'a str, request_id: u64) -> Self {
        Self {
            action: "connect",
            value: vec![account_number],
            auth_token,
            request_id,
        }
    }
}

/// Account stream heartbeat frame.
#[derive(Debug, Serialize)]
pub struct HeartbeatFrame<'a> {
    /// Always `"heartbeat"`.
    pub action: &'static str,

    /// Current session token.
    #[serde(rename = "auth-token")]
    pub auth_token: &'a str,

    /// Fresh request id per heartbeat.
    #[serde(rename = "request-id")]
    pub request_id: u64,
}

impl<'a> HeartbeatFrame<'a> {
    /// Build a heartbeat frame.
    #[must_use]
    pub fn new(auth_token: &'a str, request_id: u64) -> Self {
        Self {
            action: "heartbeat",
            auth_token,
            request_id,
        }
    }
}

/// Status response correlated to a connect or heartbeat frame.
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    /// `"ok"` on success; anything else is a denial.
    pub status: String,

    /// Echo of the request's action.
    pub action: Option<String>,

    /// Server-assigned socket session id.
    #[serde(rename = "web-socket-session-id")]
    pub web_socket_session_id: Option<String>,

    /// Echo of the request id this frame responds to.
    #[serde(rename = "request-id")]
    pub request_id: Option<u64>,

    /// Echo of the request's value, if any.
    pub value: Option<serde_json::Value>,

    /// Human-readable detail on denial.
    pub message: Option<String>,
}

impl StatusResponse {
    /// Whether the server accepted the request.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}
