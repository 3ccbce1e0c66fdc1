//! Infrastructure Layer
//!
//! Adapters for external systems: the venue REST API and account stream, the
//! dxLink feed, and the ambient configuration and tracing setup.

/// Environment-driven configuration.
pub mod config;

/// dxLink market-data feed integration.
pub mod dxlink;

/// Shared socket session machinery.
pub mod socket;

/// tastytrade venue integration.
pub mod tastytrade;

/// Tracing subscriber setup.
pub mod telemetry;
