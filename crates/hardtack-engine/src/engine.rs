//! Compliance engine - the check/apply/rollback state machine

use crate::cancel::CancelFlag;
use crate::registry::AdapterRegistry;
use crate::retry::RetryPolicy;
use hardtack_catalog::RuleCatalog;
use hardtack_common::Config;
use hardtack_core::{
    Actor, AssignmentStore, Device, DeviceStore, Error, EvaluationStatus, FailureCause,
    FailureKind, PlannedAction, PlatformAdapter, ReportAction, ReportStore, Result, Rule,
    RuleEvaluation, RulebookStatus, RulebookStore, RulebookVersion, RulebookVersionId,
    SettingValue,
};
use hardtack_report::ComplianceReporter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Engine tuning
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound for each adapter read or write
    pub operation_timeout: Duration,
    /// Devices a `FleetRunner` works on at the same time
    pub max_concurrent_devices: usize,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(5),
            max_concurrent_devices: 8,
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            operation_timeout: Duration::from_millis(config.engine.operation_timeout_ms),
            max_concurrent_devices: config.engine.max_concurrent_devices.max(1),
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

/// Storage the engine reads from and reports into
#[derive(Clone)]
pub struct EngineStores {
    pub devices: Arc<dyn DeviceStore>,
    pub rulebooks: Arc<dyn RulebookStore>,
    pub assignments: Arc<dyn AssignmentStore>,
    pub reports: Arc<dyn ReportStore>,
}

impl EngineStores {
    /// Use one backend for every store
    pub fn shared<S>(store: S) -> Self
    where
        S: DeviceStore + RulebookStore + AssignmentStore + ReportStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            devices: store.clone(),
            rulebooks: store.clone(),
            assignments: store.clone(),
            reports: store,
        }
    }
}

/// Result of applying or rolling back a batch of evaluations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Rule ids that reached the target state
    pub succeeded: Vec<String>,
    /// Rule ids that ended up `Failed`
    pub failed: Vec<String>,
    /// Rule ids skipped because the run was cancelled
    pub not_started: Vec<String>,
    /// Changes a dry run would have made
    pub planned: Vec<PlannedAction>,
}

impl BatchOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.not_started.is_empty()
    }
}

/// Result of `enforce` for one device
#[derive(Debug, Clone)]
pub struct EnforceOutcome {
    pub device_id: String,
    pub rulebook_version_id: RulebookVersionId,
    /// Final state of every evaluated rule
    pub evaluations: Vec<RuleEvaluation>,
    pub actions: BatchOutcome,
}

impl EnforceOutcome {
    pub fn count(&self, status: EvaluationStatus) -> usize {
        self.evaluations.iter().filter(|e| e.status == status).count()
    }
}

/// Drives platform adapters through check, apply and rollback
///
/// Work on one device is serialized by a per-device lock; different devices
/// proceed independently. Every adapter call is bounded by
/// `operation_timeout` and retried per `RetryPolicy` on transient errors.
/// Each check, apply or rollback attempt appends exactly one report.
pub struct ComplianceEngine {
    catalog: Arc<RuleCatalog>,
    adapters: AdapterRegistry,
    stores: EngineStores,
    reporter: ComplianceReporter,
    config: EngineConfig,
    actor: Actor,
    cancel: CancelFlag,
    device_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ComplianceEngine {
    pub fn new(
        catalog: Arc<RuleCatalog>,
        adapters: AdapterRegistry,
        stores: EngineStores,
        config: EngineConfig,
    ) -> Self {
        let reporter = ComplianceReporter::new(stores.reports.clone());
        Self {
            catalog,
            adapters,
            stores,
            reporter,
            config,
            actor: Actor::System,
            cancel: CancelFlag::new(),
            device_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Attribute reports written by this engine to `actor`
    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reporter(&self) -> &ComplianceReporter {
        &self.reporter
    }

    pub fn stores(&self) -> &EngineStores {
        &self.stores
    }

    /// Flag that stops new rules and devices from starting
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// A fresh evaluation of `rule_id` from `rulebook` for `device`
    pub fn evaluation_for(
        &self,
        device: &Device,
        rulebook: &RulebookVersion,
        rule_id: &str,
    ) -> Result<RuleEvaluation> {
        let expected = rulebook.content.expected(rule_id).ok_or_else(|| {
            Error::not_found("rule in rulebook", format!("{} ({})", rule_id, rulebook.id))
        })?;
        let rule = self.catalog.require(rule_id)?;
        Ok(RuleEvaluation::new(
            &device.id,
            rulebook.id,
            rule_id,
            rule.severity,
            expected.clone(),
        ))
    }

    /// Look a device up by id, then by hostname
    pub fn find_device(&self, device_ref: &str) -> Result<Device> {
        if let Some(device) = self.stores.devices.get_device(device_ref)? {
            return Ok(device);
        }
        self.stores
            .devices
            .find_by_hostname(device_ref)?
            .ok_or_else(|| Error::not_found("device", device_ref))
    }

    /// The device's assigned rulebook version
    ///
    /// A version that was rolled back is refused with `Conflict`; the device
    /// must be reassigned first.
    pub fn assigned_rulebook(&self, device_id: &str) -> Result<RulebookVersion> {
        let assignment = self
            .stores
            .assignments
            .assignment_for(device_id)?
            .ok_or_else(|| Error::not_found("assignment", device_id))?;
        let version = self
            .stores
            .rulebooks
            .get_version(assignment.rulebook_version_id)?
            .ok_or_else(|| {
                Error::not_found("rulebook version", assignment.rulebook_version_id.to_string())
            })?;

        if version.status == RulebookStatus::RolledBack {
            warn!(
                device = %device_id,
                rulebook = %version.id,
                "Assigned rulebook was rolled back"
            );
            return Err(Error::Conflict(format!(
                "{} assigned to {} was rolled back; reassign the device",
                version.id, device_id
            )));
        }
        Ok(version)
    }

    async fn lock_device(&self, device_id: &str) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self
                .device_locks
                .lock()
                .map_err(|_| Error::Internal("device lock table poisoned".into()))?;
            locks
                .entry(device_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        Ok(lock.lock_owned().await)
    }

    // === Single-rule operations ===

    /// Observe the rule's current value and classify it
    ///
    /// Adapter failures leave the evaluation `Failed` and are not returned as
    /// errors. An `Applied` evaluation must be rolled back before re-checking.
    pub async fn check(&self, device: &Device, evaluation: &mut RuleEvaluation) -> Result<EvaluationStatus> {
        let _guard = self.lock_device(&device.id).await?;
        self.check_locked(device, evaluation).await
    }

    /// Write the remediation target for a drifted rule and confirm it
    ///
    /// `NotChecked` evaluations are checked first. A `Compliant` evaluation is
    /// returned unchanged without any write.
    pub async fn apply(&self, device: &Device, evaluation: &mut RuleEvaluation) -> Result<EvaluationStatus> {
        let _guard = self.lock_device(&device.id).await?;
        self.apply_locked(device, evaluation).await
    }

    /// Restore the value captured before `apply`
    pub async fn rollback(&self, device: &Device, evaluation: &mut RuleEvaluation) -> Result<EvaluationStatus> {
        let _guard = self.lock_device(&device.id).await?;
        self.rollback_locked(device, evaluation).await
    }

    // === Batch operations ===

    /// Check every rule of `rulebook`
    ///
    /// One rule failing does not stop the others. Rules for another platform
    /// end up `Failed` with an unsupported-platform cause and are reported. After cancellation the
    /// remaining rules are returned `NotChecked` and are not reported.
    pub async fn check_rules(&self, device: &Device, rulebook: &RulebookVersion) -> Result<Vec<RuleEvaluation>> {
        let _guard = self.lock_device(&device.id).await?;
        self.check_rules_locked(device, rulebook).await
    }

    /// Apply every `NonCompliant` evaluation, highest severity first
    ///
    /// With `dry_run` nothing is written, no evaluation changes and no report
    /// is appended; the planned changes are returned instead.
    pub async fn apply_rules(
        &self,
        device: &Device,
        evaluations: &mut [RuleEvaluation],
        dry_run: bool,
    ) -> Result<BatchOutcome> {
        let _guard = self.lock_device(&device.id).await?;
        self.apply_rules_locked(device, evaluations, dry_run).await
    }

    /// Roll back every `Applied` evaluation
    pub async fn rollback_applied(
        &self,
        device: &Device,
        evaluations: &mut [RuleEvaluation],
    ) -> Result<BatchOutcome> {
        let _guard = self.lock_device(&device.id).await?;
        check_ownership(device, evaluations)?;

        let mut outcome = BatchOutcome::default();
        for evaluation in evaluations
            .iter_mut()
            .filter(|e| e.status == EvaluationStatus::Applied)
        {
            if self.cancel.is_cancelled() {
                outcome.not_started.push(evaluation.rule_id.clone());
                continue;
            }
            match self.rollback_locked(device, evaluation).await? {
                EvaluationStatus::RolledBack => outcome.succeeded.push(evaluation.rule_id.clone()),
                _ => outcome.failed.push(evaluation.rule_id.clone()),
            }
        }
        Ok(outcome)
    }

    /// Check only: evaluate a device against its assigned rulebook
    pub async fn check_device(&self, device_ref: &str) -> Result<Vec<RuleEvaluation>> {
        let device = self.find_device(device_ref)?;
        let _guard = self.lock_device(&device.id).await?;
        let rulebook = self.assigned_rulebook(&device.id)?;
        self.check_rules_locked(&device, &rulebook).await
    }

    /// Check a device against its assigned rulebook and remediate drift
    ///
    /// `device_ref` is a device id or hostname.
    pub async fn enforce(&self, device_ref: &str, dry_run: bool) -> Result<EnforceOutcome> {
        let device = self.find_device(device_ref)?;
        let _guard = self.lock_device(&device.id).await?;
        let rulebook = self.assigned_rulebook(&device.id)?;

        let mut evaluations = self.check_rules_locked(&device, &rulebook).await?;
        let actions = self
            .apply_rules_locked(&device, &mut evaluations, dry_run)
            .await?;

        info!(
            device = %device.id,
            rulebook = %rulebook.id,
            dry_run,
            rules = evaluations.len(),
            applied = actions.succeeded.len(),
            failed = actions.failed.len(),
            planned = actions.planned.len(),
            "Enforcement finished"
        );

        Ok(EnforceOutcome {
            device_id: device.id,
            rulebook_version_id: rulebook.id,
            evaluations,
            actions,
        })
    }

    // === Internals; callers hold the device lock ===

    async fn check_rules_locked(&self, device: &Device, rulebook: &RulebookVersion) -> Result<Vec<RuleEvaluation>> {
        let mut evaluations = Vec::with_capacity(rulebook.content.len());

        for (rule_id, expected) in &rulebook.content.rules {
            let severity = self
                .catalog
                .get(rule_id)
                .map(|r| r.severity)
                .unwrap_or_default();
            let mut evaluation =
                RuleEvaluation::new(&device.id, rulebook.id, rule_id, severity, expected.clone());

            if self.cancel.is_cancelled() {
                evaluations.push(evaluation);
                continue;
            }
            self.check_locked(device, &mut evaluation).await?;
            evaluations.push(evaluation);
        }

        Ok(evaluations)
    }

    async fn apply_rules_locked(
        &self,
        device: &Device,
        evaluations: &mut [RuleEvaluation],
        dry_run: bool,
    ) -> Result<BatchOutcome> {
        check_ownership(device, evaluations)?;

        let mut order: Vec<usize> = (0..evaluations.len())
            .filter(|&i| evaluations[i].is_drift())
            .collect();
        order.sort_by(|&a, &b| {
            evaluations[b]
                .severity
                .cmp(&evaluations[a].severity)
                .then_with(|| evaluations[a].rule_id.cmp(&evaluations[b].rule_id))
        });

        let mut outcome = BatchOutcome::default();
        for i in order {
            let evaluation = &mut evaluations[i];

            if dry_run {
                outcome.planned.push(PlannedAction {
                    device_id: device.id.clone(),
                    rule_id: evaluation.rule_id.clone(),
                    severity: evaluation.severity,
                    from: evaluation.current_value.clone(),
                    to: evaluation
                        .expected_value
                        .remediation_target(evaluation.current_value.as_ref()),
                });
                continue;
            }

            if self.cancel.is_cancelled() {
                outcome.not_started.push(evaluation.rule_id.clone());
                continue;
            }

            match self.apply_locked(device, evaluation).await? {
                EvaluationStatus::Applied => outcome.succeeded.push(evaluation.rule_id.clone()),
                _ => outcome.failed.push(evaluation.rule_id.clone()),
            }
        }

        Ok(outcome)
    }

    async fn check_locked(&self, device: &Device, evaluation: &mut RuleEvaluation) -> Result<EvaluationStatus> {
        if evaluation.status == EvaluationStatus::Applied {
            return Err(Error::InvalidState(format!(
                "{} on {} is applied; roll it back before re-checking",
                evaluation.rule_id, device.id
            )));
        }

        match self.resolve(device, &evaluation.rule_id) {
            Ok((rule, adapter)) => match self.read_value(adapter.as_ref(), device, &rule).await {
                Ok(value) => evaluation.observe(value),
                Err(e) => {
                    warn!(device = %device.id, rule = %rule.id, error = %e, "Check failed");
                    evaluation.fail(FailureCause::from(&e));
                }
            },
            Err(e) => {
                warn!(device = %device.id, rule = %evaluation.rule_id, error = %e, "Check failed");
                evaluation.fail(FailureCause::from(&e));
            }
        }

        debug!(
            device = %device.id,
            rule = %evaluation.rule_id,
            status = %evaluation.status,
            "Checked rule"
        );
        self.reporter
            .record(evaluation, ReportAction::Check, &self.actor)?;
        Ok(evaluation.status)
    }

    async fn apply_locked(&self, device: &Device, evaluation: &mut RuleEvaluation) -> Result<EvaluationStatus> {
        let checked_now = evaluation.status == EvaluationStatus::NotChecked;
        if checked_now {
            self.check_locked(device, evaluation).await?;
        }

        match evaluation.status {
            EvaluationStatus::Compliant => {
                debug!(device = %device.id, rule = %evaluation.rule_id, "Already compliant");
                return Ok(EvaluationStatus::Compliant);
            }
            EvaluationStatus::NonCompliant => {}
            // the implicit check could not observe the device; already reported
            EvaluationStatus::Failed if checked_now => return Ok(EvaluationStatus::Failed),
            other => {
                return Err(Error::InvalidState(format!(
                    "cannot apply {} on {} from {}",
                    evaluation.rule_id, device.id, other
                )));
            }
        }

        let (rule, adapter) = match self.resolve(device, &evaluation.rule_id) {
            Ok(found) => found,
            Err(e) => {
                evaluation.fail(FailureCause::from(&e));
                self.reporter
                    .record(evaluation, ReportAction::Apply, &self.actor)?;
                return Ok(evaluation.status);
            }
        };

        let target = evaluation
            .expected_value
            .remediation_target(evaluation.current_value.as_ref());
        evaluation.rollback_value = evaluation.current_value.clone();

        match self
            .write_and_read_back(adapter.as_ref(), device, &rule, &target)
            .await
        {
            Ok(observed) if evaluation.expected_value.matches(&observed) => {
                evaluation.current_value = Some(observed);
                evaluation.status = EvaluationStatus::Applied;
                evaluation.failure = None;
                info!(device = %device.id, rule = %rule.id, value = %target, "Applied rule");
            }
            Ok(observed) => {
                warn!(
                    device = %device.id,
                    rule = %rule.id,
                    wrote = %target,
                    read = %observed,
                    "Apply not confirmed"
                );
                evaluation.fail(FailureCause::new(
                    FailureKind::Unconfirmed,
                    format!("wrote {} but read back {}", target, observed),
                ));
                evaluation.current_value = Some(observed);
            }
            Err(e) => {
                warn!(device = %device.id, rule = %rule.id, error = %e, "Apply failed");
                evaluation.fail(FailureCause::from(&e));
            }
        }

        self.reporter
            .record(evaluation, ReportAction::Apply, &self.actor)?;
        Ok(evaluation.status)
    }

    async fn rollback_locked(&self, device: &Device, evaluation: &mut RuleEvaluation) -> Result<EvaluationStatus> {
        let restore = match (evaluation.status, &evaluation.rollback_value) {
            (EvaluationStatus::Applied | EvaluationStatus::Failed, Some(value)) => value.clone(),
            (EvaluationStatus::Applied | EvaluationStatus::Failed, None) => {
                return Err(Error::InvalidState(format!(
                    "{} on {} has no captured value to restore",
                    evaluation.rule_id, device.id
                )));
            }
            (other, _) => {
                return Err(Error::InvalidState(format!(
                    "cannot roll back {} on {} from {}",
                    evaluation.rule_id, device.id, other
                )));
            }
        };

        let (rule, adapter) = match self.resolve(device, &evaluation.rule_id) {
            Ok(found) => found,
            Err(e) => {
                evaluation.fail(FailureCause::from(&e));
                self.reporter
                    .record(evaluation, ReportAction::Rollback, &self.actor)?;
                return Ok(evaluation.status);
            }
        };

        match self
            .write_and_read_back(adapter.as_ref(), device, &rule, &restore)
            .await
        {
            Ok(observed) if observed == restore => {
                evaluation.current_value = Some(observed);
                evaluation.status = EvaluationStatus::RolledBack;
                evaluation.failure = None;
                info!(device = %device.id, rule = %rule.id, value = %restore, "Rolled back rule");
            }
            Ok(observed) => {
                evaluation.fail(FailureCause::new(
                    FailureKind::Unconfirmed,
                    format!("restored {} but read back {}", restore, observed),
                ));
                evaluation.current_value = Some(observed);
            }
            Err(e) => {
                warn!(device = %device.id, rule = %rule.id, error = %e, "Rollback failed");
                evaluation.fail(FailureCause::from(&e));
            }
        }

        self.reporter
            .record(evaluation, ReportAction::Rollback, &self.actor)?;
        Ok(evaluation.status)
    }

    /// Catalog rule and adapter for a rule id on a device
    fn resolve(&self, device: &Device, rule_id: &str) -> Result<(Arc<Rule>, Arc<dyn PlatformAdapter>)> {
        let rule = self.catalog.require(rule_id)?;
        if rule.os_type != device.os_type {
            return Err(Error::UnsupportedPlatform {
                os_type: device.os_type.to_string(),
                rule_id: rule.id.clone(),
            });
        }
        let adapter = self.adapters.for_rule(&rule)?;
        Ok((rule, adapter))
    }

    async fn read_value(&self, adapter: &dyn PlatformAdapter, device: &Device, rule: &Rule) -> Result<SettingValue> {
        let limit = self.config.operation_timeout;
        self.config
            .retry
            .run("read", move || async move {
                match timeout(limit, adapter.read(device, rule)).await {
                    Ok(result) => result,
                    Err(_) => Err(timeout_error("read", device, rule, limit)),
                }
            })
            .await
    }

    async fn write_value(
        &self,
        adapter: &dyn PlatformAdapter,
        device: &Device,
        rule: &Rule,
        value: &SettingValue,
    ) -> Result<()> {
        let limit = self.config.operation_timeout;
        self.config
            .retry
            .run("write", move || async move {
                match timeout(limit, adapter.write(device, rule, value)).await {
                    Ok(result) => result,
                    Err(_) => Err(timeout_error("write", device, rule, limit)),
                }
            })
            .await
    }

    async fn write_and_read_back(
        &self,
        adapter: &dyn PlatformAdapter,
        device: &Device,
        rule: &Rule,
        value: &SettingValue,
    ) -> Result<SettingValue> {
        self.write_value(adapter, device, rule, value).await?;
        self.read_value(adapter, device, rule).await
    }
}

fn timeout_error(operation: &'static str, device: &Device, rule: &Rule, limit: Duration) -> Error {
    Error::Timeout {
        operation,
        device_id: device.id.clone(),
        rule_id: rule.id.clone(),
        after_ms: limit.as_millis() as u64,
    }
}

fn check_ownership(device: &Device, evaluations: &[RuleEvaluation]) -> Result<()> {
    match evaluations.iter().find(|e| e.device_id != device.id) {
        Some(other) => Err(Error::Validation(format!(
            "evaluation of {} belongs to {}, not {}",
            other.rule_id, other.device_id, device.id
        ))),
        None => Ok(()),
    }
}
