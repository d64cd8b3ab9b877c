//! Status summaries over the latest report of each (device, rule) pair

use hardtack_core::{ComplianceReport, EvaluationStatus, Severity};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Result of a status query
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceStatus {
    /// Latest report per (device, rule), ordered by device then rule
    pub entries: Vec<ComplianceReport>,
    pub summary: ComplianceSummary,
}

/// Aggregate counts for a set of latest reports
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComplianceSummary {
    /// Devices with at least one report
    pub devices: usize,
    /// (device, rule) pairs covered
    pub total: usize,
    /// Pairs last seen compliant or remediated
    pub passing: usize,
    /// Pairs last seen drifted, rolled back or failed
    pub failing: usize,
    /// Subset of `failing` that could not be observed or acted on
    pub errors: usize,
    /// Failing pairs by rule severity
    pub by_severity: BTreeMap<Severity, usize>,
    /// Percentage of passing pairs
    pub pass_rate: f64,
}

impl ComplianceSummary {
    pub fn from_reports(reports: &[ComplianceReport]) -> Self {
        let mut summary = ComplianceSummary::default();
        let mut devices = BTreeSet::new();

        for report in reports {
            devices.insert(report.device_id.as_str());
            summary.total += 1;

            if is_passing(report) {
                summary.passing += 1;
            } else {
                summary.failing += 1;
                if report.outcome == EvaluationStatus::Failed {
                    summary.errors += 1;
                }
                *summary.by_severity.entry(report.severity).or_insert(0) += 1;
            }
        }

        summary.devices = devices.len();
        if summary.total > 0 {
            summary.pass_rate = (summary.passing as f64 / summary.total as f64) * 100.0;
        }
        summary
    }

    pub fn is_compliant(&self) -> bool {
        self.failing == 0
    }
}

/// Whether a report leaves its rule in the expected state on the device
///
/// This looks at the outcome, not the attempt status: a successful rollback
/// puts the drifted value back.
pub fn is_passing(report: &ComplianceReport) -> bool {
    matches!(
        report.outcome,
        EvaluationStatus::Compliant | EvaluationStatus::Applied
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hardtack_core::{Actor, ReportAction, RulebookVersionId};

    fn report(device: &str, rule: &str, severity: Severity, outcome: EvaluationStatus) -> ComplianceReport {
        ComplianceReport {
            id: uuid::Uuid::new_v4(),
            device_id: device.into(),
            rulebook_version_id: RulebookVersionId(1),
            rule_id: rule.into(),
            severity,
            actor: Actor::System,
            action: ReportAction::Check,
            outcome,
            previous_value: None,
            applied_value: None,
            status: ReportAction::Check.status_for(outcome),
            detail: None,
            timestamp: Utc::now(),
            sequence: 0,
        }
    }

    #[test]
    fn test_summary_counts() {
        let reports = vec![
            report("d1", "RULE-101", Severity::High, EvaluationStatus::Compliant),
            report("d1", "RULE-205", Severity::Medium, EvaluationStatus::Failed),
            report("d2", "RULE-101", Severity::High, EvaluationStatus::NonCompliant),
            report("d2", "RULE-205", Severity::Medium, EvaluationStatus::Compliant),
        ];

        let summary = ComplianceSummary::from_reports(&reports);
        assert_eq!(summary.devices, 2);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passing, 2);
        assert_eq!(summary.failing, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.by_severity.get(&Severity::High), Some(&1));
        assert!((summary.pass_rate - 50.0).abs() < f64::EPSILON);
        assert!(!summary.is_compliant());
    }

    #[test]
    fn test_rolled_back_counts_as_failing() {
        let mut rolled_back = report("d1", "RULE-101", Severity::High, EvaluationStatus::RolledBack);
        rolled_back.action = ReportAction::Rollback;
        rolled_back.status = ReportAction::Rollback.status_for(EvaluationStatus::RolledBack);
        let mut applied = report("d1", "RULE-205", Severity::Medium, EvaluationStatus::Applied);
        applied.action = ReportAction::Apply;

        let summary = ComplianceSummary::from_reports(&[rolled_back, applied]);
        assert_eq!(summary.passing, 1);
        assert_eq!(summary.failing, 1);
        assert_eq!(summary.errors, 0);
        assert_eq!(summary.by_severity.get(&Severity::High), Some(&1));
        assert!(!summary.is_compliant());
    }

    #[test]
    fn test_empty_summary() {
        let summary = ComplianceSummary::from_reports(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.pass_rate, 0.0);
        assert!(summary.is_compliant());
    }

    #[test]
    fn test_summary_serializes() {
        let summary = ComplianceSummary::from_reports(&[report(
            "d1",
            "RULE-101",
            Severity::High,
            EvaluationStatus::NonCompliant,
        )]);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["failing"], 1);
        assert_eq!(json["by_severity"]["High"], 1);
    }
}
