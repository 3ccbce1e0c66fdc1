//! tastytrade Venue Integration
//!
//! Credential lifecycle, REST client, and account stream session for the
//! tastytrade venue. The market-data feed lives in
//! [`crate::infrastructure::dxlink`]; the two surfaces use deliberately
//! separate wire schemas.

/// Account stream session.
pub mod account;

/// Credential store (session, bearer, and quote tokens).
pub mod auth;

/// Wire types for the REST API and account stream.
pub mod messages;

/// Authenticated request/response client.
pub mod rest;
