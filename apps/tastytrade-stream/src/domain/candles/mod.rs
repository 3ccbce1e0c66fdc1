//! Candle Accumulation
//!
//! Per-symbol buffering of historical candles. The feed delivers the initial
//! backfill out of order and interleaved with live updates; the accumulator
//! appends unconditionally and defers ordering to snapshot time.
//!
//! One accumulator exists per tracked symbol + aggregation period, owned by
//! the historical-data request that created it and dropped when that request
//! completes.

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::domain::feed::CandleEvent;

/// Identifies one candle buffer: a symbol at one aggregation period.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandleKey {
    /// Base streamer symbol.
    pub symbol: String,
    /// Aggregation period attribute, e.g. `"5m"` or `"1d"`.
    pub period: String,
}

impl CandleKey {
    /// Create a candle key.
    pub fn new(symbol: impl Into<String>, period: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            period: period.into(),
        }
    }

    /// The dxFeed candle symbol for this key, e.g. `"AAPL{=5m}"`.
    #[must_use]
    pub fn streamer_symbol(&self) -> String {
        format!("{}{{={}}}", self.symbol, self.period)
    }
}

/// Buffer of historical candles with a one-shot backfill-complete signal.
///
/// `append` never rejects, deduplicates, or reorders; `snapshot` is a pure
/// projection that sorts the full buffer ascending by candle time and can be
/// taken any number of times.
#[derive(Debug, Default)]
pub struct CandleAccumulator {
    bars: Mutex<Vec<CandleEvent>>,
    snapshot_complete: Notify,
}

impl CandleAccumulator {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one candle. Input order is irrelevant.
    pub fn append(&self, bar: CandleEvent) {
        self.bars.lock().push(bar);
    }

    /// Number of buffered candles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bars.lock().len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bars.lock().is_empty()
    }

    /// All buffered candles, ascending by time.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CandleEvent> {
        let mut bars = self.bars.lock().clone();
        bars.sort_by_key(|bar| bar.time);
        bars
    }

    /// Signal that the initial backfill snapshot is complete.
    ///
    /// Wakes exactly one waiter. If no one is waiting the signal is stored
    /// and consumed by the next call to [`Self::wait_snapshot_complete`].
    pub fn complete_snapshot(&self) {
        self.snapshot_complete.notify_one();
    }

    /// Wait until the initial backfill snapshot is signalled complete.
    pub async fn wait_snapshot_complete(&self) {
        self.snapshot_complete.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn bar(time: i64) -> CandleEvent {
        CandleEvent {
            symbol: "AAPL{=5m}".to_string(),
            event_flags: 0,
            time,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 100.0,
            open_interest: 0.0,
        }
    }

    #[test]
    fn candle_key_streamer_symbol() {
        let key = CandleKey::new("AAPL", "5m");
        assert_eq!(key.streamer_symbol(), "AAPL{=5m}");
    }

    #[test]
    fn snapshot_sorts_out_of_order_bars() {
        let acc = CandleAccumulator::new();
        acc.append(bar(3));
        acc.append(bar(1));
        acc.append(bar(2));

        let times: Vec<i64> = acc.snapshot().iter().map(|b| b.time).collect();
        assert_eq!(times, vec![1, 2, 3]);
    }

    #[test]
    fn snapshot_is_repeatable() {
        let acc = CandleAccumulator::new();
        acc.append(bar(2));
        acc.append(bar(1));

        assert_eq!(acc.snapshot(), acc.snapshot());
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn append_keeps_duplicates() {
        let acc = CandleAccumulator::new();
        acc.append(bar(1));
        acc.append(bar(1));
        assert_eq!(acc.len(), 2);
    }

    #[tokio::test]
    async fn signal_wakes_single_waiter() {
        let acc = Arc::new(CandleAccumulator::new());

        let waiter = {
            let acc = Arc::clone(&acc);
            tokio::spawn(async move { acc.wait_snapshot_complete().await })
        };

        // Give the waiter time to park before signalling.
        tokio::time::sleep(Duration::from_millis(10)).await;
        acc.complete_snapshot();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be woken")
            .expect("waiter task should not panic");
    }

    #[tokio::test]
    async fn signal_before_wait_is_not_lost() {
        let acc = CandleAccumulator::new();
        acc.complete_snapshot();

        tokio::time::timeout(Duration::from_millis(100), acc.wait_snapshot_complete())
            .await
            .expect("stored signal should release the waiter immediately");
    }
}
