//! dxLink Feed Session
//!
//! Socket session for the dxLink market-data feed. The handshake is four
//! ordered steps (protocol setup, token authorization, feed channel open,
//! feed configuration), each bounded by a per-step timeout. Only after the
//! feed configuration is confirmed does any subscription traffic flow, and
//! the desired subscription set is replayed on every (re)connect because the
//! server forgets it on disconnect.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::codec::FeedDecoder;
use super::messages::{
    AuthFrame, ChannelRequestFrame, FeedSetupFrame, FeedSubscriptionFrame, InboundFrame,
    KeepaliveFrame, SetupFrame, accept_event_fields,
};
use crate::domain::feed::FeedEvent;
use crate::domain::subscription::{SubscriptionEntry, SubscriptionSet};
use crate::infrastructure::socket::{
    FrameSink, Handshake, SessionError, SessionProtocol, SessionState, SocketSession,
};
use crate::infrastructure::tastytrade::auth::TokenStore;

/// Client protocol version announced in the setup frame.
const SETUP_VERSION: &str = "0.1-tastytrade-stream/0.1.0";

/// Default per-step bound for handshake waits.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default keep-alive interval.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Marker in the quote-token endpoint or level indicating delayed data.
const DELAYED_MARKER: &str = "delayed";

/// Configuration for the dxLink session.
#[derive(Debug, Clone)]
pub struct DxLinkConfig {
    /// Per-step bound for handshake waits.
    pub handshake_timeout: Duration,
    /// Interval between keep-alive frames.
    pub keepalive_interval: Duration,
    /// Keep-alive timeout (seconds) declared in the setup frame.
    pub keepalive_timeout_secs: u64,
}

impl Default for DxLinkConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            keepalive_timeout_secs: 60,
        }
    }
}

/// Protocol implementation for the dxLink feed.
pub struct DxLinkProtocol {
    config: DxLinkConfig,
    store: Arc<TokenStore>,
    decoder: FeedDecoder,
    subscriptions: parking_lot::RwLock<SubscriptionSet>,
    feed_tx: mpsc::UnboundedSender<FeedEvent>,
    endpoint_cache: parking_lot::Mutex<Option<String>>,
    delayed_warned: AtomicBool,
}

impl DxLinkProtocol {
    /// Create the protocol. Decoded feed events flow out through `feed_tx`.
    /// Performs no I/O.
    #[must_use]
    pub fn new(
        config: DxLinkConfig,
        store: Arc<TokenStore>,
        feed_tx: mpsc::UnboundedSender<FeedEvent>,
    ) -> Self {
        Self {
            config,
            store,
            decoder: FeedDecoder::new(),
            subscriptions: parking_lot::RwLock::new(SubscriptionSet::new()),
            feed_tx,
            endpoint_cache: parking_lot::Mutex::new(None),
            delayed_warned: AtomicBool::new(false),
        }
    }

    /// Await the handshake frame a step expects.
    ///
    /// Known-ignorable frames (keep-alives, non-authorized auth states) are
    /// skipped; an `ERROR` frame aborts with the server's code and message;
    /// any other kind aborts as unsupported.
    async fn await_frame(
        &self,
        handshake: &mut Handshake<'_>,
        step: &'static str,
        expected: &'static str,
    ) -> Result<InboundFrame, SessionError> {
        loop {
            let text = handshake.expect_text(step).await?;
            let Ok(frame) = serde_json::from_str::<InboundFrame>(&text) else {
                return Err(SessionError::UnsupportedMessage(preview(&text)));
            };

            match frame.frame_type.as_str() {
                kind if kind == expected => {
                    if expected == "AUTH_STATE" && !frame.is_authorized() {
                        // Unsolicited UNAUTHORIZED state precedes the real answer.
                        continue;
                    }
                    return Ok(frame);
                }
                "ERROR" => {
                    return Err(SessionError::Protocol {
                        code: frame.error.unwrap_or_else(|| "UNKNOWN".to_string()),
                        message: frame.message.unwrap_or_default(),
                    });
                }
                "KEEPALIVE" | "AUTH_STATE" => continue,
                other => return Err(SessionError::UnsupportedMessage(other.to_string())),
            }
        }
    }
}

#[async_trait]
impl SessionProtocol for DxLinkProtocol {
    fn name(&self) -> &'static str {
        "dxlink"
    }

    async fn endpoint(&self) -> Result<String, SessionError> {
        let token = self.store.quote_token().await?;

        let changed = {
            let mut cached = self.endpoint_cache.lock();
            let changed = cached.as_deref() != Some(token.dxlink_url.as_str());
            if changed {
                *cached = Some(token.dxlink_url.clone());
            }
            changed
        };

        let delayed = token.level.contains(DELAYED_MARKER)
            || token.dxlink_url.contains(DELAYED_MARKER);
        if delayed && !self.delayed_warned.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                url = %token.dxlink_url,
                level = %token.level,
                "market data feed is delayed; real-time entitlement is missing"
            );
        } else if changed {
            tracing::debug!(url = %token.dxlink_url, "feed endpoint changed");
        }

        Ok(token.dxlink_url)
    }

    fn handshake_timeout(&self) -> Duration {
        self.config.handshake_timeout
    }

    async fn handshake(&self, handshake: &mut Handshake<'_>) -> Result<(), SessionError> {
        let token = self.store.quote_token().await?;

        let setup = SetupFrame::new(SETUP_VERSION, self.config.keepalive_timeout_secs);
        handshake.send(serde_json::to_string(&setup)?).await?;
        self.await_frame(handshake, "setup", "SETUP").await?;

        let auth = AuthFrame::new(&token.token);
        handshake.send(serde_json::to_string(&auth)?).await?;
        self.await_frame(handshake, "authorize", "AUTH_STATE").await?;

        let channel_request = ChannelRequestFrame::feed();
        handshake.send(serde_json::to_string(&channel_request)?).await?;
        self.await_frame(handshake, "channel-open", "CHANNEL_OPENED").await?;

        let feed_setup = FeedSetupFrame::new(accept_event_fields());
        handshake.send(serde_json::to_string(&feed_setup)?).await?;
        self.await_frame(handshake, "feed-configure", "FEED_CONFIG").await?;

        Ok(())
    }

    fn keepalive_interval(&self) -> Duration {
        self.config.keepalive_interval
    }

    async fn keepalive_frame(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string(&KeepaliveFrame::new())?)
    }

    async fn on_ready(&self, outbox: &FrameSink) -> Result<(), SessionError> {
        // Subscriptions do not survive a reconnect server-side; replay the
        // full desired set.
        let entries = self.subscriptions.read().entries();
        if entries.is_empty() {
            return Ok(());
        }
        tracing::info!(count = entries.len(), "replaying feed subscriptions");
        let frame = FeedSubscriptionFrame::add(&entries);
        outbox.send(serde_json::to_string(&frame)?)
    }

    fn on_frame(&self, text: &str) {
        let Ok(frame) = serde_json::from_str::<InboundFrame>(text) else {
            tracing::warn!(frame = preview(text), "skipping unparseable feed frame");
            return;
        };

        match frame.frame_type.as_str() {
            "FEED_DATA" => {
                let Some(data) = frame.data else {
                    tracing::warn!("FEED_DATA frame without data payload");
                    return;
                };
                match self.decoder.decode_envelope(&data) {
                    Ok(events) => {
                        for event in events {
                            // Receiver gone means no consumer cares anymore.
                            let _ = self.feed_tx.send(event);
                        }
                    }
                    // A malformed tick is logged and skipped, never fatal.
                    Err(e) => tracing::warn!(error = %e, "skipping malformed feed frame"),
                }
            }
            "ERROR" => {
                tracing::error!(
                    code = frame.error.as_deref().unwrap_or("UNKNOWN"),
                    message = frame.message.as_deref().unwrap_or(""),
                    "feed error frame"
                );
            }
            "KEEPALIVE" | "AUTH_STATE" | "CHANNEL_OPENED" | "FEED_CONFIG" => {}
            other => tracing::debug!(kind = other, "ignoring feed frame"),
        }
    }
}

/// Truncate a frame for log/error output.
fn preview(text: &str) -> String {
    const MAX: usize = 80;
    if text.len() <= MAX {
        text.to_string()
    } else {
        let cut = text
            .char_indices()
            .take_while(|(i, _)| *i <= MAX)
            .last()
            .map_or(0, |(i, _)| i);
        format!("{}...", &text[..cut])
    }
}

/// The dxLink feed session type.
pub type DxLinkSession = SocketSession<DxLinkProtocol>;

impl DxLinkSession {
    /// Build a dxLink session. Decoded events arrive on the returned
    /// receiver's sender side, supplied by the caller.
    #[must_use]
    pub fn market_data(
        config: DxLinkConfig,
        store: Arc<TokenStore>,
        feed_tx: mpsc::UnboundedSender<FeedEvent>,
    ) -> Self {
        Self::new(DxLinkProtocol::new(config, store, feed_tx))
    }

    /// Add entries to the desired subscription set.
    ///
    /// The set is updated regardless of connection state; when the session
    /// is ready the change is sent immediately, otherwise the next
    /// (re)connect replays the whole set.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the session is ready but the add frame
    /// cannot be sent.
    pub fn subscribe(&self, entries: Vec<SubscriptionEntry>) -> Result<(), SessionError> {
        let added = self.protocol().subscriptions.write().add(entries);
        if added.is_empty() || self.state() != SessionState::Ready {
            return Ok(());
        }
        let frame = FeedSubscriptionFrame::add(&added);
        self.send(serde_json::to_string(&frame)?)
    }

    /// Remove entries from the desired subscription set.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the session is ready but the remove frame
    /// cannot be sent.
    pub fn unsubscribe(&self, entries: Vec<SubscriptionEntry>) -> Result<(), SessionError> {
        let removed = self.protocol().subscriptions.write().remove(entries);
        if removed.is_empty() || self.state() != SessionState::Ready {
            return Ok(());
        }
        let frame = FeedSubscriptionFrame::remove(&removed);
        self.send(serde_json::to_string(&frame)?)
    }

    /// Current desired subscription entries.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<SubscriptionEntry> {
        self.protocol().subscriptions.read().entries()
    }
}
