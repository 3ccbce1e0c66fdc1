//! Tracing Setup
//!
//! Installs the global tracing subscriber with env-filter support. Hosts
//! embedding the client as a library typically install their own subscriber
//! and skip this.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: standard env-filter directives (default `tastytrade_stream=info`)

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the global subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tastytrade_stream=info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }
}
