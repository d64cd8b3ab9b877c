//! Device policy assignment

use crate::chain::RulebookChain;
use chrono::Utc;
use hardtack_core::{
    Assignment, AssignmentStore, BaselineLevel, DeviceStore, Error, Result, RulebookVersion,
};
use std::sync::Arc;
use tracing::info;

/// Binds an admin's devices to that admin's active rulebook for a level
pub struct PolicyAssigner {
    admin_id: String,
    chain: Arc<RulebookChain>,
    devices: Arc<dyn DeviceStore>,
    assignments: Arc<dyn AssignmentStore>,
}

impl PolicyAssigner {
    pub fn new(
        admin_id: impl Into<String>,
        chain: Arc<RulebookChain>,
        devices: Arc<dyn DeviceStore>,
        assignments: Arc<dyn AssignmentStore>,
    ) -> Self {
        Self {
            admin_id: admin_id.into(),
            chain,
            devices,
            assignments,
        }
    }

    fn resolve(&self, level_name: &str) -> Result<RulebookVersion> {
        let level: BaselineLevel = level_name.parse()?;
        self.chain.active(&self.admin_id, level)?.ok_or_else(|| {
            Error::not_found("active rulebook", format!("{}/{}", self.admin_id, level))
        })
    }

    fn binding(&self, device_id: &str, version: &RulebookVersion) -> Assignment {
        Assignment {
            device_id: device_id.to_string(),
            rulebook_version_id: version.id,
            baseline_level: version.baseline_level,
            assigned_at: Utc::now(),
            assigned_by: self.admin_id.clone(),
        }
    }

    /// Bind one device to the active rulebook of `level_name`, superseding any previous binding
    pub fn assign(&self, device_id: &str, level_name: &str) -> Result<Assignment> {
        let version = self.resolve(level_name)?;

        let device = self
            .devices
            .get_device(device_id)?
            .filter(|d| d.admin_id == self.admin_id)
            .ok_or_else(|| Error::not_found("device", device_id))?;

        let assignment = self.binding(&device.id, &version);
        self.assignments.put_assignments(vec![assignment.clone()])?;

        info!(
            device = %device.id,
            rulebook = %version.id,
            level = %version.baseline_level,
            "Assigned rulebook"
        );
        Ok(assignment)
    }

    /// Bind every device of this admin to the same resolved rulebook
    ///
    /// The active version is looked up once, and all bindings are written in a
    /// single store call, so either every device moves or none does.
    pub fn assign_all(&self, level_name: &str) -> Result<Vec<Assignment>> {
        let version = self.resolve(level_name)?;

        let batch: Vec<Assignment> = self
            .devices
            .list_devices()?
            .iter()
            .filter(|d| d.admin_id == self.admin_id)
            .map(|d| self.binding(&d.id, &version))
            .collect();

        self.assignments.put_assignments(batch.clone())?;

        info!(
            devices = batch.len(),
            rulebook = %version.id,
            level = %version.baseline_level,
            "Assigned rulebook to fleet"
        );
        Ok(batch)
    }

    pub fn assignment(&self, device_id: &str) -> Result<Option<Assignment>> {
        self.assignments.assignment_for(device_id)
    }
}
