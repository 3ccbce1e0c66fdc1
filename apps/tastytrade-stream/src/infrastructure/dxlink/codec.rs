//! Feed Decoder
//!
//! Decodes the dxLink feed's compact positional wire format into typed
//! events. The payload is a two-element envelope `[kind, flatArray]` where
//! the flat array concatenates fixed-width tuples:
//!
//! | kind    | width | fields                                                                   |
//! |---------|-------|--------------------------------------------------------------------------|
//! | Trade   | 4     | symbol, price, size, time                                                |
//! | Quote   | 5     | symbol, bidPrice, askPrice, bidSize, askSize                             |
//! | Summary | 2     | symbol, openInterest                                                     |
//! | Candle  | 9     | symbol, eventFlags, time, open, high, low, close, volume, openInterest   |
//!
//! Numeric cells that do not parse as finite numbers decode as zero instead
//! of failing the frame. The feed routinely sends `"NaN"` strings and nulls
//! for missing values; a single bad cell must never cost a whole frame.
//!
//! The format is read-only in this client; there is no encoder.

use serde_json::Value;

use crate::domain::feed::{
    CandleEvent, EventKind, FeedEvent, QuoteEvent, SummaryEvent, TradeEvent,
};

/// Decoder errors. Any of these means the whole frame is unusable.
#[derive(Debug, thiserror::Error)]
pub enum FeedDecodeError {
    /// The envelope is not a `[kind, flatArray]` pair.
    #[error("feed envelope must be a [kind, values] pair")]
    MalformedEnvelope,

    /// The leading discriminator names no known event kind.
    #[error("unrecognized feed event kind: {0}")]
    UnknownEventKind(String),

    /// The flat array length is not a multiple of the kind's field width.
    #[error("{kind} records truncated: {len} values is not a multiple of {width}")]
    RecordStride {
        /// Event kind being decoded.
        kind: EventKind,
        /// Length of the flat array.
        len: usize,
        /// Expected tuple width for the kind.
        width: usize,
    },
}

/// Stateless decoder for positional feed envelopes.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedDecoder;

impl FeedDecoder {
    /// Create a decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Tuple width for an event kind.
    #[must_use]
    pub const fn field_width(kind: EventKind) -> usize {
        match kind {
            EventKind::Trade => 4,
            EventKind::Quote => 5,
            EventKind::Summary => 2,
            EventKind::Candle => 9,
        }
    }

    /// Decode a `[kind, flatArray]` envelope.
    ///
    /// # Errors
    ///
    /// Returns [`FeedDecodeError`] if the envelope shape, discriminator, or
    /// record stride is wrong.
    pub fn decode_envelope(&self, data: &Value) -> Result<Vec<FeedEvent>, FeedDecodeError> {
        let Some(pair) = data.as_array() else {
            return Err(FeedDecodeError::MalformedEnvelope);
        };
        let [kind, values] = pair.as_slice() else {
            return Err(FeedDecodeError::MalformedEnvelope);
        };
        let (Some(kind), Some(values)) = (kind.as_str(), values.as_array()) else {
            return Err(FeedDecodeError::MalformedEnvelope);
        };
        self.decode(kind, values)
    }

    /// Decode a flat record array for the named event kind.
    ///
    /// # Errors
    ///
    /// Returns [`FeedDecodeError`] on an unknown kind or a stride mismatch.
    pub fn decode(&self, kind: &str, values: &[Value]) -> Result<Vec<FeedEvent>, FeedDecodeError> {
        let kind = EventKind::parse(kind)
            .ok_or_else(|| FeedDecodeError::UnknownEventKind(kind.to_string()))?;

        let width = Self::field_width(kind);
        if values.len() % width != 0 {
            return Err(FeedDecodeError::RecordStride {
                kind,
                len: values.len(),
                width,
            });
        }

        let events = values
            .chunks_exact(width)
            .map(|record| match kind {
                EventKind::Trade => FeedEvent::Trade(TradeEvent {
                    symbol: symbol_cell(&record[0]),
                    price: lenient_f64(&record[1]),
                    size: lenient_f64(&record[2]),
                    time: lenient_i64(&record[3]),
                }),
                EventKind::Quote => FeedEvent::Quote(QuoteEvent {
                    symbol: symbol_cell(&record[0]),
                    bid_price: lenient_f64(&record[1]),
                    ask_price: lenient_f64(&record[2]),
                    bid_size: lenient_f64(&record[3]),
                    ask_size: lenient_f64(&record[4]),
                }),
                EventKind::Summary => FeedEvent::Summary(SummaryEvent {
                    symbol: symbol_cell(&record[0]),
                    open_interest: lenient_f64(&record[1]),
                }),
                EventKind::Candle => FeedEvent::Candle(CandleEvent {
                    symbol: symbol_cell(&record[0]),
                    event_flags: lenient_i64(&record[1]),
                    time: lenient_i64(&record[2]),
                    open: lenient_f64(&record[3]),
                    high: lenient_f64(&record[4]),
                    low: lenient_f64(&record[5]),
                    close: lenient_f64(&record[6]),
                    volume: lenient_f64(&record[7]),
                    open_interest: lenient_f64(&record[8]),
                }),
            })
            .collect();

        Ok(events)
    }
}

/// Symbol cell: non-string cells decode as the empty symbol.
fn symbol_cell(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

/// Numeric cell: numbers pass through, numeric strings parse, everything
/// else (including non-finite values) decodes as zero.
fn lenient_f64(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite()).unwrap_or(0.0)
}

/// Integer cell (times, flags): truncates fractional values, defaults zero.
#[allow(clippy::cast_possible_truncation)]
fn lenient_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.parse::<i64>().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    #[test]
    fn decodes_two_trades_from_flat_array() {
        let decoder = FeedDecoder::new();
        let envelope = json!([
            "Trade",
            ["AAPL", 100.5, 10, 1_690_000_000_000_i64, "MSFT", 210.0, 5, 1_690_000_000_500_i64]
        ]);

        let events = decoder.decode_envelope(&envelope).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            FeedEvent::Trade(TradeEvent {
                symbol: "AAPL".to_string(),
                price: 100.5,
                size: 10.0,
                time: 1_690_000_000_000,
            })
        );
        assert_eq!(
            events[1],
            FeedEvent::Trade(TradeEvent {
                symbol: "MSFT".to_string(),
                price: 210.0,
                size: 5.0,
                time: 1_690_000_000_500,
            })
        );
    }

    #[test]
    fn unknown_kind_fails() {
        let decoder = FeedDecoder::new();
        let envelope = json!(["Bogus", ["AAPL", 1.0]]);

        assert!(matches!(
            decoder.decode_envelope(&envelope),
            Err(FeedDecodeError::UnknownEventKind(kind)) if kind == "Bogus"
        ));
    }

    #[test]
    fn stride_mismatch_fails() {
        let decoder = FeedDecoder::new();
        // Five values cannot hold 4-field trade tuples.
        let envelope = json!(["Trade", ["AAPL", 100.5, 10, 0, "MSFT"]]);

        assert!(matches!(
            decoder.decode_envelope(&envelope),
            Err(FeedDecodeError::RecordStride {
                kind: EventKind::Trade,
                len: 5,
                width: 4,
            })
        ));
    }

    #[test_case(json!(["x", 1.0]); "not an envelope pair")]
    #[test_case(json!({"Trade": []}); "object instead of array")]
    #[test_case(json!([7, ["AAPL"]]); "non-string kind")]
    #[test_case(json!(["Trade", "AAPL"]); "non-array values")]
    fn malformed_envelope_fails(envelope: Value) {
        let decoder = FeedDecoder::new();
        assert!(matches!(
            decoder.decode_envelope(&envelope),
            Err(FeedDecodeError::MalformedEnvelope)
        ));
    }

    #[test]
    fn quote_wire_order_maps_into_record_fields() {
        let decoder = FeedDecoder::new();
        // Wire order: symbol, bidPrice, askPrice, bidSize, askSize.
        let envelope = json!(["Quote", ["SPY", 449.5, 449.7, 300, 200]]);

        let events = decoder.decode_envelope(&envelope).unwrap();
        assert_eq!(
            events[0],
            FeedEvent::Quote(QuoteEvent {
                symbol: "SPY".to_string(),
                bid_price: 449.5,
                bid_size: 300.0,
                ask_price: 449.7,
                ask_size: 200.0,
            })
        );
    }

    #[test]
    fn summary_and_candle_decode() {
        let decoder = FeedDecoder::new();

        let summary = decoder
            .decode_envelope(&json!(["Summary", ["./ESZ6", 120_500]]))
            .unwrap();
        assert_eq!(
            summary[0],
            FeedEvent::Summary(SummaryEvent {
                symbol: "./ESZ6".to_string(),
                open_interest: 120_500.0,
            })
        );

        let candle = decoder
            .decode_envelope(&json!([
                "Candle",
                ["AAPL{=5m}", 0, 1_690_000_000_000_i64, 1.0, 2.0, 0.5, 1.5, 1000, 0]
            ]))
            .unwrap();
        match &candle[0] {
            FeedEvent::Candle(bar) => {
                assert_eq!(bar.symbol, "AAPL{=5m}");
                assert_eq!(bar.high, 2.0);
                assert_eq!(bar.volume, 1000.0);
            }
            other => panic!("expected candle, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_numeric_cells_default_to_zero() {
        let decoder = FeedDecoder::new();
        let envelope = json!(["Quote", ["AAPL", "NaN", null, "12.5", {}]]);

        let events = decoder.decode_envelope(&envelope).unwrap();
        assert_eq!(
            events[0],
            FeedEvent::Quote(QuoteEvent {
                symbol: "AAPL".to_string(),
                bid_price: 0.0,
                ask_price: 0.0,
                bid_size: 12.5,
                ask_size: 0.0,
            })
        );
    }

    #[test]
    fn numeric_strings_parse() {
        let decoder = FeedDecoder::new();
        let envelope = json!(["Trade", ["AAPL", "100.5", "10", "1690000000000"]]);

        let events = decoder.decode_envelope(&envelope).unwrap();
        assert_eq!(
            events[0],
            FeedEvent::Trade(TradeEvent {
                symbol: "AAPL".to_string(),
                price: 100.5,
                size: 10.0,
                time: 1_690_000_000_000,
            })
        );
    }

    proptest! {
        #[test]
        fn any_whole_number_of_trade_tuples_decodes(
            records in prop::collection::vec(
                (any::<u32>(), 0.0_f64..1e6, 0.0_f64..1e5, 0_i64..2_000_000_000_000),
                0..16,
            )
        ) {
            let decoder = FeedDecoder::new();
            let mut flat = Vec::new();
            for (id, price, size, time) in &records {
                flat.push(json!(format!("SYM{id}")));
                flat.push(json!(price));
                flat.push(json!(size));
                flat.push(json!(time));
            }

            let events = decoder.decode("Trade", &flat).unwrap();
            prop_assert_eq!(events.len(), records.len());
            for (event, (id, price, size, time)) in events.iter().zip(&records) {
                match event {
                    FeedEvent::Trade(trade) => {
                        prop_assert_eq!(&trade.symbol, &format!("SYM{id}"));
                        prop_assert_eq!(trade.price, *price);
                        prop_assert_eq!(trade.size, *size);
                        prop_assert_eq!(trade.time, *time);
                    }
                    other => prop_assert!(false, "expected trade, got {other:?}"),
                }
            }
        }
    }
}
