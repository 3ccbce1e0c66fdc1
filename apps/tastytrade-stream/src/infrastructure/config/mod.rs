//! Configuration
//!
//! Environment-driven settings for the streaming client.

mod settings;

pub use settings::{ConfigError, Settings};
