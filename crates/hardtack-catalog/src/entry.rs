//! JSON catalog entries

use hardtack_core::{Error, ExpectedValue, OsType, Result, Rule, Severity, ValueSchema};
use serde::{Deserialize, Serialize};

/// One rule as written in a catalog file
///
/// ```json
/// {
///   "rule_id": "RULE-101",
///   "description": "Disable SSH root login",
///   "severity": "High",
///   "setting": "sshd.permit_root_login",
///   "expected_value": false
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub rule_id: String,

    /// Short name; the description is used when absent
    #[serde(default)]
    pub name: Option<String>,

    pub description: String,

    /// Severity name, case-insensitive
    pub severity: String,

    /// Target OS, defaults to Linux
    #[serde(default)]
    pub os_type: Option<String>,

    /// Adapter setting key, defaults to the rule id
    #[serde(default)]
    pub setting: Option<String>,

    /// Explicit schema; inferred from `expected_value` when absent
    #[serde(default)]
    pub schema: Option<ValueSchema>,

    pub expected_value: ExpectedValue,
}

impl CatalogEntry {
    /// Parse a catalog file body: a JSON array of entries
    pub fn parse_file(content: &str) -> Result<Vec<CatalogEntry>> {
        Ok(serde_json::from_str(content)?)
    }

    /// Validate the entry and turn it into a catalog rule
    pub fn into_rule(self) -> Result<Rule> {
        let id = self.rule_id.trim().to_string();
        if id.is_empty() {
            return Err(Error::Validation("rule_id must not be empty".into()));
        }

        let severity: Severity = self.severity.parse()?;
        let os_type = match &self.os_type {
            Some(os) => os.parse()?,
            None => OsType::Linux,
        };
        let schema = self
            .schema
            .unwrap_or_else(|| ValueSchema::infer(&self.expected_value));

        let name = self.name.unwrap_or_else(|| self.description.clone());
        let mut rule = Rule::new(id, name, severity, os_type, schema)
            .with_description(self.description);
        if let Some(setting) = self.setting {
            rule = rule.with_setting(setting);
        }

        rule.validate_expected(&self.expected_value)?;
        Ok(rule.with_default(self.expected_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hardtack_core::SettingValue;

    #[test]
    fn test_minimal_entry_defaults() {
        let json = r#"[{
            "rule_id": "RULE-101",
            "description": "Disable SSH root login",
            "severity": "high",
            "expected_value": false
        }]"#;

        let mut entries = CatalogEntry::parse_file(json).unwrap();
        let rule = entries.remove(0).into_rule().unwrap();

        assert_eq!(rule.id, "RULE-101");
        assert_eq!(rule.name, "Disable SSH root login");
        assert_eq!(rule.severity, Severity::High);
        assert_eq!(rule.os_type, OsType::Linux);
        assert_eq!(rule.setting, "RULE-101");
        assert_eq!(rule.schema, ValueSchema::Boolean);
        assert_eq!(rule.default_value, Some(ExpectedValue::from(false)));
    }

    #[test]
    fn test_explicit_schema_checks_expected_value() {
        let json = r#"[{
            "rule_id": "RULE-302",
            "description": "Firewall state",
            "severity": "Medium",
            "schema": {"type": "enum", "options": ["active", "inactive"]},
            "expected_value": "enabled"
        }]"#;

        let mut entries = CatalogEntry::parse_file(json).unwrap();
        let err = entries.remove(0).into_rule().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_windows_range_entry() {
        let json = r#"[{
            "rule_id": "RULE-510",
            "name": "Minimum password length",
            "description": "Require long passwords",
            "severity": "medium",
            "os_type": "Windows",
            "setting": "secpol.MinimumPasswordLength",
            "expected_value": {"min": 14}
        }]"#;

        let mut entries = CatalogEntry::parse_file(json).unwrap();
        let rule = entries.remove(0).into_rule().unwrap();
        assert_eq!(rule.os_type, OsType::Windows);
        assert_eq!(rule.setting, "secpol.MinimumPasswordLength");
        assert!(rule
            .default_value
            .unwrap()
            .matches(&SettingValue::Integer(20)));
    }

    #[test]
    fn test_unknown_severity() {
        let entry = CatalogEntry {
            rule_id: "X".into(),
            name: None,
            description: "x".into(),
            severity: "urgent".into(),
            os_type: None,
            setting: None,
            schema: None,
            expected_value: ExpectedValue::from(true),
        };
        assert!(matches!(entry.into_rule(), Err(Error::Validation(_))));
    }
}
