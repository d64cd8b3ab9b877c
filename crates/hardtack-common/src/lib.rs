//! Hardtack Common - Shared utilities: logging, configuration, digest helpers
//!
//! This crate provides common functionality used across all Hardtack crates.

pub mod config;
pub mod digest;
pub mod logging;

pub use config::{Config, ConfigBuilder};
pub use digest::{canonical_hash, canonical_string, sha256_hex};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogFormat};
