//! kensa: changed-file decoding and LLM review driver for CI (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod cache;
pub mod changes;
pub mod config;
pub mod constants;
pub mod env;
pub mod extensions;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod providers;
