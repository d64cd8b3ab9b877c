//! Hardtack Engine - Compliance evaluation and remediation
//!
//! This crate drives the per-rule state machine
//! (`NotChecked -> Compliant | NonCompliant -> Applied -> RolledBack`) through
//! pluggable `PlatformAdapter`s:
//! - `ComplianceEngine`: check, apply and rollback for one device
//! - `AdapterRegistry`: adapter lookup by operating system
//! - `RetryPolicy`: exponential backoff for transient adapter failures
//! - `FleetRunner`: bounded-concurrency runs across every assigned device

pub mod cancel;
pub mod engine;
pub mod fleet;
pub mod registry;
pub mod retry;

#[cfg(test)]
mod testing;

pub use cancel::CancelFlag;
pub use engine::{BatchOutcome, ComplianceEngine, EngineConfig, EngineStores, EnforceOutcome};
pub use fleet::{DeviceRun, FleetRunner};
pub use registry::AdapterRegistry;
pub use retry::RetryPolicy;
