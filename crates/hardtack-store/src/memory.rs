//! In-memory storage backend

use hardtack_core::{
    Assignment, AssignmentStore, ChainScope, ComplianceReport, Device, DeviceStore, Error,
    ReportFilter, ReportStore, Result, RulebookStatus, RulebookStore, RulebookVersion,
    RulebookVersionId,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Default)]
struct State {
    devices: BTreeMap<String, Device>,
    versions: BTreeMap<RulebookVersionId, RulebookVersion>,
    last_version_id: u64,
    assignments: BTreeMap<String, Assignment>,
    reports: Vec<ComplianceReport>,
    last_sequence: u64,
}

impl State {
    fn check_updates(&self, updates: &[(RulebookVersionId, RulebookStatus)]) -> Result<()> {
        for (id, _) in updates {
            if !self.versions.contains_key(id) {
                return Err(Error::not_found("rulebook version", id.to_string()));
            }
        }
        Ok(())
    }

    fn apply_updates(&mut self, updates: &[(RulebookVersionId, RulebookStatus)]) {
        for (id, status) in updates {
            if let Some(version) = self.versions.get_mut(id) {
                version.status = *status;
            }
        }
    }
}

/// Storage backed by process memory
///
/// Cloning shares the underlying state. Every operation takes one lock, so
/// multi-record writes (`commit_version`, `put_assignments`) are atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".into()))
    }

    /// Number of reports appended so far
    pub fn report_count(&self) -> Result<usize> {
        Ok(self.lock()?.reports.len())
    }
}

impl DeviceStore for MemoryStore {
    fn add_device(&self, device: Device) -> Result<()> {
        let mut state = self.lock()?;
        if state.devices.contains_key(&device.id) {
            return Err(Error::Conflict(format!("device {} already exists", device.id)));
        }
        debug!(device = %device.id, hostname = %device.hostname, "Adding device");
        state.devices.insert(device.id.clone(), device);
        Ok(())
    }

    fn remove_device(&self, device_id: &str) -> Result<Device> {
        let mut state = self.lock()?;
        let device = state
            .devices
            .remove(device_id)
            .ok_or_else(|| Error::not_found("device", device_id))?;
        state.assignments.remove(device_id);
        Ok(device)
    }

    fn get_device(&self, device_id: &str) -> Result<Option<Device>> {
        Ok(self.lock()?.devices.get(device_id).cloned())
    }

    fn find_by_hostname(&self, hostname: &str) -> Result<Option<Device>> {
        Ok(self
            .lock()?
            .devices
            .values()
            .find(|d| d.hostname == hostname)
            .cloned())
    }

    fn list_devices(&self) -> Result<Vec<Device>> {
        Ok(self.lock()?.devices.values().cloned().collect())
    }
}

impl RulebookStore for MemoryStore {
    fn commit_version(
        &self,
        mut version: RulebookVersion,
        status_updates: &[(RulebookVersionId, RulebookStatus)],
    ) -> Result<RulebookVersion> {
        let mut state = self.lock()?;
        state.check_updates(status_updates)?;

        state.last_version_id += 1;
        version.id = RulebookVersionId(state.last_version_id);
        state.apply_updates(status_updates);
        state.versions.insert(version.id, version.clone());

        debug!(id = %version.id, scope = %version.scope(), version = version.version, "Committed rulebook version");
        Ok(version)
    }

    fn set_statuses(&self, updates: &[(RulebookVersionId, RulebookStatus)]) -> Result<()> {
        let mut state = self.lock()?;
        state.check_updates(updates)?;
        state.apply_updates(updates);
        Ok(())
    }

    fn get_version(&self, id: RulebookVersionId) -> Result<Option<RulebookVersion>> {
        Ok(self.lock()?.versions.get(&id).cloned())
    }

    fn versions_in_scope(&self, scope: &ChainScope) -> Result<Vec<RulebookVersion>> {
        let state = self.lock()?;
        let mut versions: Vec<RulebookVersion> = state
            .versions
            .values()
            .filter(|v| v.admin_id == scope.admin_id && v.baseline_level == scope.level)
            .cloned()
            .collect();
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }

    fn all_versions(&self) -> Result<Vec<RulebookVersion>> {
        Ok(self.lock()?.versions.values().cloned().collect())
    }
}

impl AssignmentStore for MemoryStore {
    fn put_assignments(&self, assignments: Vec<Assignment>) -> Result<()> {
        let mut state = self.lock()?;
        for assignment in assignments {
            state
                .assignments
                .insert(assignment.device_id.clone(), assignment);
        }
        Ok(())
    }

    fn assignment_for(&self, device_id: &str) -> Result<Option<Assignment>> {
        Ok(self.lock()?.assignments.get(device_id).cloned())
    }

    fn assignments(&self) -> Result<Vec<Assignment>> {
        Ok(self.lock()?.assignments.values().cloned().collect())
    }
}

impl ReportStore for MemoryStore {
    fn append_report(&self, mut report: ComplianceReport) -> Result<ComplianceReport> {
        let mut state = self.lock()?;
        state.last_sequence += 1;
        report.sequence = state.last_sequence;
        state.reports.push(report.clone());
        Ok(report)
    }

    fn query_reports(&self, filter: &ReportFilter) -> Result<Vec<ComplianceReport>> {
        let state = self.lock()?;
        let mut reports: Vec<ComplianceReport> = state
            .reports
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        reports.sort_by(|a, b| (a.timestamp, a.sequence).cmp(&(b.timestamp, b.sequence)));
        Ok(reports)
    }
}
