//! Domain Layer
//!
//! Core streaming types with no I/O dependencies.

/// Typed market data events decoded from the dxLink feed.
pub mod feed;

/// Desired-state subscription tracking.
pub mod subscription;

/// Historical candle buffering for backfill snapshots.
pub mod candles;
