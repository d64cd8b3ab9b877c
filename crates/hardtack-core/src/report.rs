//! Append-only compliance audit records

use crate::evaluation::EvaluationStatus;
use crate::rulebook::RulebookVersionId;
use crate::severity::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a persisted report
pub type ReportId = Uuid;

/// Who triggered an attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Actor {
    Employee(String),
    Admin(String),
    System,
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Employee(id) => write!(f, "employee:{}", id),
            Actor::Admin(id) => write!(f, "admin:{}", id),
            Actor::System => write!(f, "system"),
        }
    }
}

/// Which engine step produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportAction {
    Check,
    Apply,
    Rollback,
}

impl ReportAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportAction::Check => "check",
            ReportAction::Apply => "apply",
            ReportAction::Rollback => "rollback",
        }
    }

    /// Report status for the evaluation state this action reached
    pub fn status_for(&self, outcome: EvaluationStatus) -> ReportStatus {
        let success = match self {
            ReportAction::Check => outcome == EvaluationStatus::Compliant,
            ReportAction::Apply => outcome == EvaluationStatus::Applied,
            ReportAction::Rollback => outcome == EvaluationStatus::RolledBack,
        };
        if success {
            ReportStatus::Successful
        } else {
            ReportStatus::Unsuccessful
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportStatus {
    Successful,
    Unsuccessful,
}

/// One check, apply or rollback attempt; written once, never changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub id: ReportId,
    pub device_id: String,
    pub rulebook_version_id: RulebookVersionId,
    pub rule_id: String,
    pub severity: Severity,
    pub actor: Actor,
    pub action: ReportAction,
    pub outcome: EvaluationStatus,
    pub previous_value: Option<String>,
    pub applied_value: Option<String>,
    pub status: ReportStatus,
    #[serde(default)]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Store-assigned append order, set when the report is persisted
    #[serde(default)]
    pub sequence: u64,
}

/// Query filters for reports; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub device_id: Option<String>,
    pub rulebook_version_id: Option<RulebookVersionId>,
    pub rule_id: Option<String>,
    pub status: Option<ReportStatus>,
    pub action: Option<ReportAction>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl ReportFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn rulebook_version(mut self, id: RulebookVersionId) -> Self {
        self.rulebook_version_id = Some(id);
        self
    }

    pub fn rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn status(mut self, status: ReportStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn action(mut self, action: ReportAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Inclusive time window
    pub fn between(mut self, since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        self.since = since;
        self.until = until;
        self
    }

    pub fn matches(&self, report: &ComplianceReport) -> bool {
        self.device_id.as_ref().map_or(true, |d| *d == report.device_id)
            && self
                .rulebook_version_id
                .map_or(true, |v| v == report.rulebook_version_id)
            && self.rule_id.as_ref().map_or(true, |r| *r == report.rule_id)
            && self.status.map_or(true, |s| s == report.status)
            && self.action.map_or(true, |a| a == report.action)
            && self.since.map_or(true, |t| report.timestamp >= t)
            && self.until.map_or(true, |t| report.timestamp <= t)
    }
}
