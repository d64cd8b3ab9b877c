//! Hardtack Store - Storage backends for devices, rulebooks, assignments and reports
//!
//! The engine only talks to the traits in `hardtack_core::store`. `MemoryStore`
//! implements all of them behind one lock and is what tests and embedded
//! deployments use.

pub mod memory;

pub use memory::MemoryStore;
