//! Hardtack Core - Foundation types, traits, and error handling
//!
//! This crate provides the core abstractions used throughout the Hardtack engine:
//! - `Rule`: Canonical catalog entry for one hardening setting
//! - `RulebookVersion`: Immutable, hash-chained snapshot of expected values
//! - `RuleEvaluation`: Per-run state of one (device, rule) pair
//! - `ComplianceReport`: Append-only audit record
//! - `PlatformAdapter`: The trait every OS backend implements
//! - Storage traits consumed by the policy, report and engine crates

pub mod adapter;
pub mod assignment;
pub mod device;
pub mod error;
pub mod evaluation;
pub mod report;
pub mod rule;
pub mod rulebook;
pub mod severity;
pub mod store;
pub mod value;

// Re-export commonly used types at crate root
pub use adapter::PlatformAdapter;
pub use assignment::Assignment;
pub use device::Device;
pub use error::{Error, Result};
pub use evaluation::{EvaluationStatus, FailureCause, FailureKind, PlannedAction, RuleEvaluation};
pub use report::{Actor, ComplianceReport, ReportAction, ReportFilter, ReportId, ReportStatus};
pub use rule::{Rule, ValueSchema};
pub use rulebook::{ChainScope, RulebookContent, RulebookStatus, RulebookVersion, RulebookVersionId};
pub use severity::{BaselineLevel, OsType, Severity};
pub use store::{AssignmentStore, DeviceStore, ReportStore, RulebookStore};
pub use value::{ExpectedValue, SettingValue};
