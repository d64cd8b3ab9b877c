//! Storage interfaces consumed by the engine
//!
//! The engine depends only on CRUD-plus-append operations over these shapes.
//! Reports have no update or delete operation.

use crate::assignment::Assignment;
use crate::device::Device;
use crate::error::Result;
use crate::report::{ComplianceReport, ReportFilter};
use crate::rulebook::{ChainScope, RulebookStatus, RulebookVersion, RulebookVersionId};

/// Device inventory
pub trait DeviceStore: Send + Sync {
    /// Add a device; fails with `Conflict` if the id is taken
    fn add_device(&self, device: Device) -> Result<()>;

    /// Remove a device, returning the removed record
    fn remove_device(&self, device_id: &str) -> Result<Device>;

    fn get_device(&self, device_id: &str) -> Result<Option<Device>>;

    fn find_by_hostname(&self, hostname: &str) -> Result<Option<Device>>;

    /// All devices, ordered by id
    fn list_devices(&self) -> Result<Vec<Device>>;
}

/// Rulebook version records
pub trait RulebookStore: Send + Sync {
    /// Persist a new version and apply status changes to existing ones in one step
    ///
    /// The store assigns the version id; the id on `version` is ignored.
    fn commit_version(
        &self,
        version: RulebookVersion,
        status_updates: &[(RulebookVersionId, RulebookStatus)],
    ) -> Result<RulebookVersion>;

    /// Apply status changes atomically
    fn set_statuses(&self, updates: &[(RulebookVersionId, RulebookStatus)]) -> Result<()>;

    fn get_version(&self, id: RulebookVersionId) -> Result<Option<RulebookVersion>>;

    /// Versions of one scope, ordered by version number
    fn versions_in_scope(&self, scope: &ChainScope) -> Result<Vec<RulebookVersion>>;

    /// All versions, ordered by id
    fn all_versions(&self) -> Result<Vec<RulebookVersion>>;
}

/// Device to rulebook bindings
pub trait AssignmentStore: Send + Sync {
    /// Write a batch of assignments atomically, superseding existing ones per device
    fn put_assignments(&self, assignments: Vec<Assignment>) -> Result<()>;

    fn assignment_for(&self, device_id: &str) -> Result<Option<Assignment>>;

    fn assignments(&self) -> Result<Vec<Assignment>>;
}

/// Append-only compliance report log
pub trait ReportStore: Send + Sync {
    /// Append a report, assigning its sequence number
    fn append_report(&self, report: ComplianceReport) -> Result<ComplianceReport>;

    /// Reports matching the filter in (timestamp, sequence) order
    fn query_reports(&self, filter: &ReportFilter) -> Result<Vec<ComplianceReport>>;
}
