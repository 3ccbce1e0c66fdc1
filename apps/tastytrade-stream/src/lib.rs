#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! tastytrade-stream - Streaming Session Client
//!
//! Maintains authenticated, persistent streaming connections to the
//! tastytrade venue and decodes its compact wire formats into typed market
//! and account events.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure streaming types
//!   - `feed`: Typed market data events (trades, quotes, summaries, candles)
//!   - `subscription`: Desired-state subscription tracking
//!   - `candles`: Historical candle buffering for backfill snapshots
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `tastytrade`: Credential store, REST client, account stream session
//!   - `dxlink`: Market-data feed session and positional decoder
//!   - `socket`: Shared socket session machinery (lifecycle, keep-alive)
//!   - `config`: Environment-driven configuration
//!   - `telemetry`: Tracing subscriber setup
//!
//! # Data Flow
//!
//! ```text
//! TokenStore ──┬──► RequestClient ───────────► REST request/response
//!              ├──► AccountStreamSession ────► raw account-update frames
//!              └──► DxLinkSession ─► FeedDecoder ─► typed FeedEvents
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Pure streaming types with no I/O dependencies.
pub mod domain;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::candles::{CandleAccumulator, CandleKey};
pub use domain::feed::{
    CandleEvent, EventKind, FeedEvent, QuoteEvent, SummaryEvent, TradeEvent,
};
pub use domain::subscription::{SubscriptionEntry, SubscriptionSet};

// Credential store
pub use infrastructure::tastytrade::auth::{
    AuthConfig, AuthError, Credential, CredentialKind, QuoteToken, TokenStore,
};

// REST client
pub use infrastructure::tastytrade::rest::{ClientError, RequestClient};

// Socket sessions
pub use infrastructure::socket::{
    FrameSink, ListenerId, SessionError, SessionEvent, SessionProtocol, SessionState,
    SocketSession,
};
pub use infrastructure::tastytrade::account::{
    AccountStreamConfig, AccountStreamProtocol, AccountStreamSession,
};
pub use infrastructure::dxlink::client::{DxLinkConfig, DxLinkProtocol, DxLinkSession};
pub use infrastructure::dxlink::codec::{FeedDecodeError, FeedDecoder};

// Configuration
pub use infrastructure::config::{ConfigError, Settings};
