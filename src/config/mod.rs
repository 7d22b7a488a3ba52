//! Configuration loading and layering.
//!
//! Handles `.kensa.toml` loading, environment variable resolution,
//! and CLI flag merging with proper priority ordering.

pub mod loader;

pub use loader::{CacheConfig, Config, ConfigError, FilterConfig, ProviderConfig, ReviewConfig};
