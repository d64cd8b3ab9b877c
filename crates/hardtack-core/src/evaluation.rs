//! Per-run evaluation state for a (device, rule) pair

use crate::error::Error;
use crate::rulebook::RulebookVersionId;
use crate::severity::Severity;
use crate::value::{ExpectedValue, SettingValue};
use serde::{Deserialize, Serialize};

/// Where a (device, rule) pair sits in the check/apply/rollback state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvaluationStatus {
    #[default]
    NotChecked,
    /// Observed and matches the rulebook
    Compliant,
    /// Observed and differs from the rulebook (drift)
    NonCompliant,
    /// Corrective value written and confirmed
    Applied,
    /// Could not observe or act
    Failed,
    /// Pre-apply value restored and confirmed
    RolledBack,
}

impl EvaluationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationStatus::NotChecked => "NotChecked",
            EvaluationStatus::Compliant => "Compliant",
            EvaluationStatus::NonCompliant => "NonCompliant",
            EvaluationStatus::Applied => "Applied",
            EvaluationStatus::Failed => "Failed",
            EvaluationStatus::RolledBack => "RolledBack",
        }
    }
}

impl std::fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an evaluation ended up `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    Timeout,
    Execution,
    UnsupportedPlatform,
    /// Write completed but the re-read did not confirm the value
    Unconfirmed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureCause {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&Error> for FailureCause {
    fn from(err: &Error) -> Self {
        let kind = match err {
            Error::Timeout { .. } => FailureKind::Timeout,
            Error::UnsupportedPlatform { .. } => FailureKind::UnsupportedPlatform,
            _ => FailureKind::Execution,
        };
        FailureCause::new(kind, err.to_string())
    }
}

/// Transient state of one rule on one device during an engine run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub device_id: String,
    pub rulebook_version_id: RulebookVersionId,
    pub rule_id: String,
    pub severity: Severity,
    pub expected_value: ExpectedValue,
    pub current_value: Option<SettingValue>,
    pub status: EvaluationStatus,
    /// Value observed right before a write; present once a change was attempted
    pub rollback_value: Option<SettingValue>,
    pub failure: Option<FailureCause>,
}

impl RuleEvaluation {
    pub fn new(
        device_id: impl Into<String>,
        rulebook_version_id: RulebookVersionId,
        rule_id: impl Into<String>,
        severity: Severity,
        expected_value: ExpectedValue,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            rulebook_version_id,
            rule_id: rule_id.into(),
            severity,
            expected_value,
            current_value: None,
            status: EvaluationStatus::NotChecked,
            rollback_value: None,
            failure: None,
        }
    }

    /// Record an observation and classify it against the expected value
    pub fn observe(&mut self, value: SettingValue) {
        self.status = if self.expected_value.matches(&value) {
            EvaluationStatus::Compliant
        } else {
            EvaluationStatus::NonCompliant
        };
        self.current_value = Some(value);
        self.failure = None;
    }

    pub fn fail(&mut self, cause: FailureCause) {
        self.status = EvaluationStatus::Failed;
        self.failure = Some(cause);
    }

    pub fn is_drift(&self) -> bool {
        self.status == EvaluationStatus::NonCompliant
    }

    pub fn is_failed(&self) -> bool {
        self.status == EvaluationStatus::Failed
    }
}

/// A change a dry run would have made
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub device_id: String,
    pub rule_id: String,
    pub severity: Severity,
    pub from: Option<SettingValue>,
    pub to: SettingValue,
}
