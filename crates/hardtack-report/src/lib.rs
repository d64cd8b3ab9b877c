//! Hardtack Report - Compliance audit trail
//!
//! `ComplianceReporter` turns engine evaluations into append-only
//! `ComplianceReport` records and answers status queries over them.

pub mod reporter;
pub mod summary;

pub use reporter::ComplianceReporter;
pub use summary::{ComplianceStatus, ComplianceSummary};
