//! Feed Event Types
//!
//! Typed market data events produced by the dxLink feed decoder. The wire
//! format is positional (see `infrastructure::dxlink::codec`); these records
//! are the decoded, immutable result.
//!
//! Numeric fields are `f64`: dxFeed transports all prices and sizes as
//! doubles, and missing cells decode as zero rather than failing the frame.

// =============================================================================
// Event Kinds
// =============================================================================

/// Market data event kind carried by the feed.
///
/// The kind name doubles as the wire discriminator in feed envelopes and
/// subscription frames (`"Trade"`, `"Quote"`, `"Summary"`, `"Candle"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    /// Last-trade events.
    Trade,
    /// Top-of-book bid/ask events.
    Quote,
    /// Daily summary events (open interest).
    Summary,
    /// OHLCV candle events.
    Candle,
}

impl EventKind {
    /// Wire name of this event kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trade => "Trade",
            Self::Quote => "Quote",
            Self::Summary => "Summary",
            Self::Candle => "Candle",
        }
    }

    /// Parse a wire discriminator into an event kind.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Trade" => Some(Self::Trade),
            "Quote" => Some(Self::Quote),
            "Summary" => Some(Self::Summary),
            "Candle" => Some(Self::Candle),
            _ => None,
        }
    }

    /// All event kinds, in wire-declaration order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Trade, Self::Quote, Self::Summary, Self::Candle]
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Event Records
// =============================================================================

/// A last-trade event.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent {
    /// Streamer symbol.
    pub symbol: String,
    /// Trade price.
    pub price: f64,
    /// Trade size.
    pub size: f64,
    /// Trade time, epoch milliseconds.
    pub time: i64,
}

/// A top-of-book quote event.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteEvent {
    /// Streamer symbol.
    pub symbol: String,
    /// Best bid price.
    pub bid_price: f64,
    /// Best bid size.
    pub bid_size: f64,
    /// Best ask price.
    pub ask_price: f64,
    /// Best ask size.
    pub ask_size: f64,
}

/// A daily summary event.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryEvent {
    /// Streamer symbol.
    pub symbol: String,
    /// Open interest for the instrument.
    pub open_interest: f64,
}

/// An OHLCV candle event.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleEvent {
    /// Streamer symbol, including the aggregation period attribute.
    pub symbol: String,
    /// dxFeed event flags (snapshot boundary markers).
    pub event_flags: i64,
    /// Candle open time, epoch milliseconds.
    pub time: i64,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Traded volume.
    pub volume: f64,
    /// Open interest.
    pub open_interest: f64,
}

/// A decoded market data event.
///
/// Produced only by the feed decoder; immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Last-trade event.
    Trade(TradeEvent),
    /// Top-of-book quote event.
    Quote(QuoteEvent),
    /// Daily summary event.
    Summary(SummaryEvent),
    /// OHLCV candle event.
    Candle(CandleEvent),
}

impl FeedEvent {
    /// The streamer symbol this event belongs to.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Self::Trade(e) => &e.symbol,
            Self::Quote(e) => &e.symbol,
            Self::Summary(e) => &e.symbol,
            Self::Candle(e) => &e.symbol,
        }
    }

    /// The kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Trade(_) => EventKind::Trade,
            Self::Quote(_) => EventKind::Quote,
            Self::Summary(_) => EventKind::Summary,
            Self::Candle(_) => EventKind::Candle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_wire_names_round_trip() {
        for kind in EventKind::all() {
            assert_eq!(EventKind::parse(kind.as_str()), Some(*kind));
        }
    }

    #[test]
    fn kind_parse_rejects_unknown() {
        assert_eq!(EventKind::parse("Greeks"), None);
        assert_eq!(EventKind::parse("trade"), None);
    }

    #[test]
    fn event_symbol_and_kind() {
        let event = FeedEvent::Quote(QuoteEvent {
            symbol: "AAPL".to_string(),
            bid_price: 150.0,
            bid_size: 100.0,
            ask_price: 150.05,
            ask_size: 200.0,
        });
        assert_eq!(event.symbol(), "AAPL");
        assert_eq!(event.kind(), EventKind::Quote);
    }
}
