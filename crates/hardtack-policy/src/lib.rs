//! Hardtack Policy - Rulebook versioning and device assignment
//!
//! - `RulebookChain`: publishes, rolls back and verifies hash-chained rulebook versions
//! - `PolicyAssigner`: binds devices to the active rulebook of a baseline level

pub mod assignment;
pub mod chain;

pub use assignment::PolicyAssigner;
pub use chain::RulebookChain;
