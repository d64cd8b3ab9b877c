//! Compliance reporter - the only writer of compliance reports

use crate::summary::{is_passing, ComplianceStatus, ComplianceSummary};
use chrono::Utc;
use hardtack_core::{
    Actor, ComplianceReport, EvaluationStatus, ReportAction, ReportFilter, ReportId, ReportStore,
    Result, RuleEvaluation,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Writes one report per check, apply or rollback attempt
///
/// There is no update or delete. Concurrent callers are safe as long as the
/// underlying store's append is.
#[derive(Clone)]
pub struct ComplianceReporter {
    store: Arc<dyn ReportStore>,
}

impl ComplianceReporter {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    /// Append a report describing where `evaluation` ended up after `action`
    pub fn record(
        &self,
        evaluation: &RuleEvaluation,
        action: ReportAction,
        actor: &Actor,
    ) -> Result<ReportId> {
        let (previous_value, applied_value) = match action {
            ReportAction::Check => (evaluation.current_value.as_ref(), None),
            ReportAction::Apply => (
                evaluation
                    .rollback_value
                    .as_ref()
                    .or(evaluation.current_value.as_ref()),
                evaluation
                    .current_value
                    .as_ref()
                    .filter(|_| evaluation.status == EvaluationStatus::Applied),
            ),
            ReportAction::Rollback => (
                None,
                evaluation
                    .rollback_value
                    .as_ref()
                    .filter(|_| evaluation.status == EvaluationStatus::RolledBack),
            ),
        };

        let detail = match (&evaluation.failure, action, evaluation.status) {
            (Some(failure), _, EvaluationStatus::Failed) => Some(failure.message.clone()),
            (_, ReportAction::Apply, EvaluationStatus::Compliant) => {
                Some("already compliant, nothing written".to_string())
            }
            (_, ReportAction::Check, EvaluationStatus::NonCompliant) => Some(format!(
                "expected {}",
                evaluation.expected_value
            )),
            _ => None,
        };

        let report = ComplianceReport {
            id: uuid::Uuid::new_v4(),
            device_id: evaluation.device_id.clone(),
            rulebook_version_id: evaluation.rulebook_version_id,
            rule_id: evaluation.rule_id.clone(),
            severity: evaluation.severity,
            actor: actor.clone(),
            action,
            outcome: evaluation.status,
            previous_value: previous_value.map(|v| v.to_string()),
            applied_value: applied_value.map(|v| v.to_string()),
            status: action.status_for(evaluation.status),
            detail,
            timestamp: Utc::now(),
            sequence: 0,
        };

        let stored = self.store.append_report(report)?;
        debug!(
            device = %stored.device_id,
            rule = %stored.rule_id,
            action = stored.action.as_str(),
            outcome = %stored.outcome,
            sequence = stored.sequence,
            "Recorded compliance report"
        );
        Ok(stored.id)
    }

    /// Reports matching `filter` in timestamp order, ties broken by append order
    pub fn query(&self, filter: &ReportFilter) -> Result<Vec<ComplianceReport>> {
        self.store.query_reports(filter)
    }

    /// Latest report per (device, rule), optionally narrowed to one device
    ///
    /// A pair passes when its latest outcome is `Compliant` or `Applied`. The
    /// summary always covers every latest report in scope; `show_failed` only
    /// narrows the returned entries to the failing ones.
    pub fn status(&self, device_id: Option<&str>, show_failed: bool) -> Result<ComplianceStatus> {
        let mut filter = ReportFilter::new();
        if let Some(device_id) = device_id {
            filter = filter.device(device_id);
        }

        let mut latest: BTreeMap<(String, String), ComplianceReport> = BTreeMap::new();
        for report in self.store.query_reports(&filter)? {
            latest.insert((report.device_id.clone(), report.rule_id.clone()), report);
        }
        let latest: Vec<ComplianceReport> = latest.into_values().collect();

        let summary = ComplianceSummary::from_reports(&latest);
        let entries = if show_failed {
            latest
                .into_iter()
                .filter(|r| !is_passing(r))
                .collect()
        } else {
            latest
        };

        Ok(ComplianceStatus { entries, summary })
    }
}
