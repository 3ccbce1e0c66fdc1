//! dxLink Wire Types
//!
//! Serialization schema for the dxLink market-data channel: every frame is a
//! JSON object with a SCREAMING `type` discriminator and camelCase fields.
//! This schema is deliberately separate from the venue's kebab-case REST and
//! account-stream schema in `infrastructure::tastytrade::messages`.
//!
//! # Handshake Frames
//!
//! ```json
//! {"type":"SETUP","channel":0,"version":"...","keepaliveTimeout":60,"acceptKeepaliveTimeout":60}
//! {"type":"AUTH","channel":0,"token":"..."}
//! {"type":"CHANNEL_REQUEST","channel":1,"service":"FEED","parameters":{"contract":"AUTO"}}
//! {"type":"FEED_SETUP","channel":1,"acceptDataFormat":"FULL","acceptEventFields":{...}}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::feed::EventKind;
use crate::domain::subscription::SubscriptionEntry;

/// Control channel for setup, auth, and keep-alive frames.
pub const MAIN_CHANNEL: u64 = 0;

/// Logical channel requested for the feed service.
pub const FEED_CHANNEL: u64 = 1;

// =============================================================================
// Outbound Frames
// =============================================================================

/// Protocol/version negotiation frame.
#[derive(Debug, Serialize)]
pub struct SetupFrame {
    /// Always `"SETUP"`.
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    /// Control channel.
    pub channel: u64,
    /// Client protocol version string.
    pub version: &'static str,
    /// Seconds of client silence the server should tolerate.
    #[serde(rename = "keepaliveTimeout")]
    pub keepalive_timeout: u64,
    /// Seconds of server silence the client will tolerate.
    #[serde(rename = "acceptKeepaliveTimeout")]
    pub accept_keepalive_timeout: u64,
}

impl SetupFrame {
    /// Build a setup frame with symmetric keep-alive timeouts.
    #[must_use]
    pub const fn new(version: &'static str, keepalive_timeout_secs: u64) -> Self {
        Self {
            frame_type: "SETUP",
            channel: MAIN_CHANNEL,
            version,
            keepalive_timeout: keepalive_timeout_secs,
            accept_keepalive_timeout: keepalive_timeout_secs,
        }
    }
}

/// Token authorization frame.
#[derive(Debug, Serialize)]
pub struct AuthFrame<'a> {
    /// Always `"AUTH"`.
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    /// Control channel.
    pub channel: u64,
    /// Quote token from the venue.
    pub token: &'a str,
}

impl<'a> AuthFrame<'a> {
    /// Build an authorization frame.
    #[must_use]
    pub const fn new(token: &'a str) -> Self {
        Self {
            frame_type: "AUTH",
            channel: MAIN_CHANNEL,
            token,
        }
    }
}

/// Parameters of a channel request.
#[derive(Debug, Serialize)]
pub struct ChannelParameters {
    /// Feed contract selection.
    pub contract: &'static str,
}

/// Logical channel open request for the feed service.
#[derive(Debug, Serialize)]
pub struct ChannelRequestFrame {
    /// Always `"CHANNEL_REQUEST"`.
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    /// Requested logical channel.
    pub channel: u64,
    /// Requested service.
    pub service: &'static str,
    /// Service parameters.
    pub parameters: ChannelParameters,
}

impl ChannelRequestFrame {
    /// Build a feed channel request.
    #[must_use]
    pub const fn feed() -> Self {
        Self {
            frame_type: "CHANNEL_REQUEST",
            channel: FEED_CHANNEL,
            service: "FEED",
            parameters: ChannelParameters { contract: "AUTO" },
        }
    }
}

/// Feed configuration frame declaring the accepted fields per event kind.
#[derive(Debug, Serialize)]
pub struct FeedSetupFrame {
    /// Always `"FEED_SETUP"`.
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    /// Feed channel.
    pub channel: u64,
    /// Accepted data format; `"FULL"` keeps records positional per kind.
    #[serde(rename = "acceptDataFormat")]
    pub accept_data_format: &'static str,
    /// Field list the server should emit, per event kind.
    #[serde(rename = "acceptEventFields")]
    pub accept_event_fields: BTreeMap<&'static str, Vec<&'static str>>,
}

impl FeedSetupFrame {
    /// Build a feed setup frame from the decoder's accepted field lists.
    #[must_use]
    pub fn new(accept_event_fields: BTreeMap<&'static str, Vec<&'static str>>) -> Self {
        Self {
            frame_type: "FEED_SETUP",
            channel: FEED_CHANNEL,
            accept_data_format: "FULL",
            accept_event_fields,
        }
    }
}

/// One (symbol, type) pair in a subscription frame.
#[derive(Debug, Serialize)]
pub struct SubscriptionItem {
    /// Streamer symbol.
    pub symbol: String,
    /// Event kind wire name.
    #[serde(rename = "type")]
    pub event_type: &'static str,
}

impl From<&SubscriptionEntry> for SubscriptionItem {
    fn from(entry: &SubscriptionEntry) -> Self {
        Self {
            symbol: entry.symbol.clone(),
            event_type: entry.kind.as_str(),
        }
    }
}

/// Subscription add/remove frame carrying the changed (symbol, type) pairs.
#[derive(Debug, Serialize)]
pub struct FeedSubscriptionFrame {
    /// Always `"FEED_SUBSCRIPTION"`.
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    /// Feed channel.
    pub channel: u64,
    /// Pairs to add.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add: Vec<SubscriptionItem>,
    /// Pairs to remove.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<SubscriptionItem>,
}

impl FeedSubscriptionFrame {
    /// Build an add frame.
    #[must_use]
    pub fn add(entries: &[SubscriptionEntry]) -> Self {
        Self {
            frame_type: "FEED_SUBSCRIPTION",
            channel: FEED_CHANNEL,
            add: entries.iter().map(SubscriptionItem::from).collect(),
            remove: Vec::new(),
        }
    }

    /// Build a remove frame.
    #[must_use]
    pub fn remove(entries: &[SubscriptionEntry]) -> Self {
        Self {
            frame_type: "FEED_SUBSCRIPTION",
            channel: FEED_CHANNEL,
            add: Vec::new(),
            remove: entries.iter().map(SubscriptionItem::from).collect(),
        }
    }
}

/// Fixed keep-alive frame; carries no credential.
#[derive(Debug, Serialize)]
pub struct KeepaliveFrame {
    /// Always `"KEEPALIVE"`.
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    /// Control channel.
    pub channel: u64,
}

impl KeepaliveFrame {
    /// Build a keep-alive frame.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frame_type: "KEEPALIVE",
            channel: MAIN_CHANNEL,
        }
    }
}

impl Default for KeepaliveFrame {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Inbound Frames
// =============================================================================

/// Loose view of any inbound dxLink frame.
///
/// Only the discriminator is mandatory; the remaining fields are populated
/// per frame kind (`state` for `AUTH_STATE`, `error`/`message` for `ERROR`,
/// `data` for `FEED_DATA`).
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    /// Frame discriminator, e.g. `"SETUP"` or `"FEED_DATA"`.
    #[serde(rename = "type")]
    pub frame_type: String,
    /// Channel the frame belongs to.
    #[serde(default)]
    pub channel: u64,
    /// Authorization state for `AUTH_STATE` frames.
    pub state: Option<String>,
    /// Error code for `ERROR` frames.
    pub error: Option<String>,
    /// Human-readable message for `ERROR` frames.
    pub message: Option<String>,
    /// Feed payload for `FEED_DATA` frames: `[kind, flatArray]`.
    pub data: Option<serde_json::Value>,
}

impl InboundFrame {
    /// Whether this frame authorizes the connection.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.frame_type == "AUTH_STATE" && self.state.as_deref() == Some("AUTHORIZED")
    }
}

/// Accepted field lists per event kind, in the order the decoder walks them.
#[must_use]
pub fn accept_event_fields() -> BTreeMap<&'static str, Vec<&'static str>> {
    let mut fields = BTreeMap::new();
    fields.insert(
        EventKind::Trade.as_str(),
        vec!["eventSymbol", "price", "size", "time"],
    );
    fields.insert(
        EventKind::Quote.as_str(),
        vec!["eventSymbol", "bidPrice", "askPrice", "bidSize", "askSize"],
    );
    fields.insert(EventKind::Summary.as_str(), vec!["eventSymbol", "openInterest"]);
    fields.insert(
        EventKind::Candle.as_str(),
        vec![
            "eventSymbol",
            "eventFlags",
            "time",
            "open",
            "high",
            "low",
            "close",
            "volume",
            "openInterest",
        ],
    );
    fields
}
