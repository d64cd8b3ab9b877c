//! Rulebook snapshots - versioned, hash-chained sets of expected values

use crate::severity::BaselineLevel;
use crate::value::ExpectedValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Store-assigned identifier of a rulebook version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RulebookVersionId(pub u64);

impl std::fmt::Display for RulebookVersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rb-{}", self.0)
    }
}

/// The scope a chain of versions lives in: one chain per admin and level
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainScope {
    pub admin_id: String,
    pub level: BaselineLevel,
}

impl ChainScope {
    pub fn new(admin_id: impl Into<String>, level: BaselineLevel) -> Self {
        Self {
            admin_id: admin_id.into(),
            level,
        }
    }
}

impl std::fmt::Display for ChainScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.admin_id, self.level)
    }
}

/// Full content of a rulebook: the exact structure that gets hashed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulebookContent {
    pub baseline_level: BaselineLevel,
    /// Expected value per rule id
    pub rules: BTreeMap<String, ExpectedValue>,
}

impl RulebookContent {
    pub fn new(baseline_level: BaselineLevel) -> Self {
        Self {
            baseline_level,
            rules: BTreeMap::new(),
        }
    }

    pub fn with_rule(mut self, rule_id: impl Into<String>, expected: impl Into<ExpectedValue>) -> Self {
        self.rules.insert(rule_id.into(), expected.into());
        self
    }

    pub fn expected(&self, rule_id: &str) -> Option<&ExpectedValue> {
        self.rules.get(rule_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Lifecycle state of a version; the only field that changes after creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulebookStatus {
    Active,
    Deprecated,
    RolledBack,
}

impl RulebookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RulebookStatus::Active => "active",
            RulebookStatus::Deprecated => "deprecated",
            RulebookStatus::RolledBack => "rolled_back",
        }
    }
}

impl std::fmt::Display for RulebookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable published rulebook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulebookVersion {
    pub id: RulebookVersionId,

    /// Admin whose scope this version belongs to
    pub admin_id: String,

    /// Monotonic per scope, starting at 1
    pub version: u32,

    pub baseline_level: BaselineLevel,

    pub content: RulebookContent,

    /// Hex SHA-256 of the canonical serialization of `content`
    pub content_hash: String,

    /// Hash of the preceding version in the scope, empty for the first
    pub parent_hash: String,

    pub status: RulebookStatus,

    pub created_at: DateTime<Utc>,

    pub created_by: String,
}

impl RulebookVersion {
    pub fn scope(&self) -> ChainScope {
        ChainScope::new(self.admin_id.clone(), self.baseline_level)
    }

    pub fn is_active(&self) -> bool {
        self.status == RulebookStatus::Active
    }

    pub fn is_genesis(&self) -> bool {
        self.parent_hash.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_json_shape() {
        let content = RulebookContent::new(BaselineLevel::Strict)
            .with_rule("RULE-205", ExpectedValue::range(Some(1), Some(365)))
            .with_rule("RULE-101", false);

        let json = serde_json::to_string(&content).unwrap();
        assert_eq!(
            json,
            r#"{"baseline_level":"strict","rules":{"RULE-101":false,"RULE-205":{"min":1,"max":365}}}"#
        );

        let parsed: RulebookContent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, content);
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&RulebookStatus::RolledBack).unwrap(),
            "\"rolled_back\""
        );
    }
}
