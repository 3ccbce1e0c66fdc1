//! Credential Store
//!
//! Acquires and caches the short-lived credentials every other component
//! depends on:
//!
//! - the **venue session token**, obtained by login and kept fresh through
//!   the rotated remember-token artifact,
//! - the **delegated bearer token**, obtained from a trusted intermediary
//!   with a long-lived refresh secret,
//! - the **market-data quote token**, fetched with the session token and
//!   valid for 24 hours.
//!
//! Each cache slot is guarded by its own async mutex held across the refresh
//! network call, so concurrent callers inside the expiry window wait for the
//! in-flight refresh and reuse its result; a duplicate refresh would rotate
//! the remember token out from under the other caller.
//!
//! Every server-declared expiry is shortened by a safety buffer to tolerate
//! clock drift and in-flight latency.

use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use super::messages::{
    DelegatedTokenRequest, DelegatedTokenResponse, QuoteTokenResponse, SessionRequest,
    SessionResponse,
};

// =============================================================================
// Constants
// =============================================================================

/// Safety buffer subtracted from the server-declared session expiry.
pub const SESSION_EXPIRY_BUFFER_SECS: i64 = 10;

/// Safety buffer subtracted from the delegated token's declared lifetime.
pub const BEARER_EXPIRY_BUFFER_SECS: i64 = 60;

/// Declared lifetime of a market-data quote token.
const QUOTE_TOKEN_LIFETIME_HOURS: i64 = 24;

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while acquiring or refreshing credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The HTTP client could not be constructed.
    #[error("failed to construct http client: {0}")]
    Client(#[source] reqwest::Error),

    /// The server rejected a login/refresh call.
    #[error("{call} rejected (status {status}): {body}")]
    Rejected {
        /// The failing call, e.g. `"session login"`.
        call: &'static str,
        /// HTTP status code.
        status: u16,
        /// Raw error body.
        body: String,
    },

    /// Network-level failure on a login/refresh call.
    #[error("{call} transport error: {source}")]
    Transport {
        /// The failing call.
        call: &'static str,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be decoded.
    #[error("{call} returned an undecodable body: {source}")]
    Decode {
        /// The failing call.
        call: &'static str,
        /// Underlying decode error.
        #[source]
        source: reqwest::Error,
    },
}

// =============================================================================
// Credentials
// =============================================================================

/// Which credential a caller needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// Venue session token (bare value in the authorization header).
    Session,
    /// Delegated bearer token (`Bearer` scheme).
    Bearer,
}

/// A time-bounded authentication value.
///
/// Replaced wholesale on every refresh; never mutated in place. The `Debug`
/// implementation redacts the token value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// The credential kind.
    pub kind: CredentialKind,
    value: String,
    /// Expiry with the safety buffer already applied.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential.
    #[must_use]
    pub const fn new(kind: CredentialKind, value: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            value,
            expires_at,
        }
    }

    /// The raw token value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The authorization header value, with the scheme implied by the kind.
    #[must_use]
    pub fn authorization_value(&self) -> String {
        match self.kind {
            CredentialKind::Session => self.value.clone(),
            CredentialKind::Bearer => format!("Bearer {}", self.value),
        }
    }

    /// Whether the credential has passed its buffered expiry.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("kind", &self.kind)
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Market-data feed credential: endpoint, entitlement level, and token.
#[derive(Debug, Clone)]
pub struct QuoteToken {
    /// dxLink WebSocket endpoint.
    pub dxlink_url: String,
    /// Data entitlement level, e.g. `"api"` or `"delayed"`.
    pub level: String,
    /// Feed authorization token.
    pub token: String,
    /// Expiry of the cached token.
    pub expires_at: DateTime<Utc>,
}

impl QuoteToken {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// =============================================================================
// Token Store
// =============================================================================

/// Configuration for the token store.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Venue REST base URL.
    pub base_url: String,
    /// Venue login.
    pub login: String,
    /// Venue password.
    pub password: String,
    /// Trusted intermediary base URL for delegated tokens.
    pub intermediary_url: String,
    /// Long-lived refresh secret for delegated tokens.
    pub refresh_secret: String,
    /// Account the delegated token is scoped to.
    pub account_number: String,
    /// Brokerage identifier sent to the intermediary.
    pub brokerage: String,
}

#[derive(Default)]
struct SessionSlot {
    credential: Option<Credential>,
    remember_token: Option<String>,
}

/// Shared credential cache with serialized refresh per slot.
pub struct TokenStore {
    http: reqwest::Client,
    config: AuthConfig,
    session: Mutex<SessionSlot>,
    bearer: Mutex<Option<Credential>>,
    quote: Mutex<Option<QuoteToken>>,
}

impl TokenStore {
    /// Create a token store. Performs no I/O.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Client`] if the HTTP client cannot be built.
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(AuthError::Client)?;

        Ok(Self {
            http,
            config,
            session: Mutex::new(SessionSlot::default()),
            bearer: Mutex::new(None),
            quote: Mutex::new(None),
        })
    }

    /// Current valid credential of the requested kind.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the underlying login/refresh call fails.
    pub async fn credential(&self, kind: CredentialKind) -> Result<Credential, AuthError> {
        match kind {
            CredentialKind::Session => self.session_token().await,
            CredentialKind::Bearer => self.bearer_token().await,
        }
    }

    /// Current valid venue session token.
    ///
    /// Logs in on first use; refreshes with the rotated remember token once
    /// the cached credential reaches its buffered expiry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the login or refresh call fails.
    pub async fn session_token(&self) -> Result<Credential, AuthError> {
        let mut slot = self.session.lock().await;

        if let Some(credential) = &slot.credential
            && !credential.is_expired(Utc::now())
        {
            return Ok(credential.clone());
        }

        let (call, request) = match slot.remember_token.as_deref() {
            Some(remember_token) => (
                "session refresh",
                SessionRequest {
                    login: &self.config.login,
                    password: None,
                    remember_token: Some(remember_token),
                    remember_me: true,
                },
            ),
            None => (
                "session login",
                SessionRequest {
                    login: &self.config.login,
                    password: Some(&self.config.password),
                    remember_token: None,
                    remember_me: true,
                },
            ),
        };

        let url = format!("{}/sessions", self.config.base_url);
        let response: SessionResponse = self.post_json(call, &url, &request).await?;

        // The artifact rotates on every response; the previous one is dead.
        slot.remember_token = response.remember_token;

        let expires_at =
            response.session_expiration - chrono::Duration::seconds(SESSION_EXPIRY_BUFFER_SECS);
        let credential = Credential::new(CredentialKind::Session, response.session_token, expires_at);
        slot.credential = Some(credential.clone());

        tracing::debug!(call, expires_at = %expires_at, "session credential cached");
        Ok(credential)
    }

    /// Current valid delegated bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the intermediary refresh call fails.
    pub async fn bearer_token(&self) -> Result<Credential, AuthError> {
        let mut slot = self.bearer.lock().await;

        if let Some(credential) = &*slot
            && !credential.is_expired(Utc::now())
        {
            return Ok(credential.clone());
        }

        let request = DelegatedTokenRequest {
            brokerage: &self.config.brokerage,
            refresh_token: &self.config.refresh_secret,
            account_number: &self.config.account_number,
        };
        let url = format!("{}/live/auth0/refresh", self.config.intermediary_url);
        let response: DelegatedTokenResponse =
            self.post_json("delegated-token refresh", &url, &request).await?;

        let expires_at = Utc::now()
            + chrono::Duration::seconds(response.expires_in - BEARER_EXPIRY_BUFFER_SECS);
        let credential = Credential::new(CredentialKind::Bearer, response.access_token, expires_at);
        *slot = Some(credential.clone());

        tracing::debug!(expires_at = %expires_at, "bearer credential cached");
        Ok(credential)
    }

    /// Current valid market-data quote token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the session token or the quote-token call
    /// fails.
    pub async fn quote_token(&self) -> Result<QuoteToken, AuthError> {
        let session = self.session_token().await?;
        let mut slot = self.quote.lock().await;

        if let Some(token) = &*slot
            && !token.is_expired(Utc::now())
        {
            return Ok(token.clone());
        }

        let call = "quote token";
        let url = format!("{}/api-quote-tokens", self.config.base_url);
        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, session.authorization_value())
            .send()
            .await
            .map_err(|source| AuthError::Transport { call, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                call,
                status: status.as_u16(),
                body,
            });
        }

        let body: QuoteTokenResponse = response
            .json()
            .await
            .map_err(|source| AuthError::Decode { call, source })?;

        let token = QuoteToken {
            dxlink_url: body.dxlink_url,
            level: body.level,
            token: body.token,
            expires_at: Utc::now() + chrono::Duration::hours(QUOTE_TOKEN_LIFETIME_HOURS),
        };
        *slot = Some(token.clone());

        tracing::debug!(level = %token.level, "quote token cached");
        Ok(token)
    }

    /// Drop the cached session credential and remember token.
    ///
    /// Used after logout, when the server has invalidated both.
    pub async fn invalidate_session(&self) {
        let mut slot = self.session.lock().await;
        slot.credential = None;
        slot.remember_token = None;
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        call: &'static str,
        url: &str,
        body: &B,
    ) -> Result<T, AuthError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| AuthError::Transport { call, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                call,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|source| AuthError::Decode { call, source })
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("base_url", &self.config.base_url)
            .field("login", &self.config.login)
            .finish_non_exhaustive()
    }
}
