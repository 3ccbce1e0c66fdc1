//! dxLink Feed Integration
//!
//! Market-data session, positional feed decoder, and wire types for the
//! dxLink streaming protocol.

/// Feed session and subscription operations.
pub mod client;

/// Positional feed decoder.
pub mod codec;

/// dxLink frame types.
pub mod messages;
