//! Canonical hardening rule definitions

use crate::error::{Error, Result};
use crate::severity::{OsType, Severity};
use crate::value::{ExpectedValue, SettingValue};
use serde::{Deserialize, Serialize};

/// A catalog rule - the immutable description of one hardening setting
///
/// Rules carry no runtime state. Per-device progress lives in `RuleEvaluation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Stable identifier (e.g., "RULE-101")
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Detailed description
    #[serde(default)]
    pub description: String,

    pub severity: Severity,

    /// Platform the setting lives on
    pub os_type: OsType,

    /// Setting key handed to the platform adapter (e.g., "sshd.permit_root_login")
    pub setting: String,

    /// Shape every expected value for this rule must have
    pub schema: ValueSchema,

    /// Recommended value when a rulebook does not override it
    #[serde(default)]
    pub default_value: Option<ExpectedValue>,
}

impl Rule {
    /// Create a new rule; the setting key defaults to the rule id
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        severity: Severity,
        os_type: OsType,
        schema: ValueSchema,
    ) -> Self {
        let id = id.into();
        Self {
            setting: id.clone(),
            id,
            name: name.into(),
            description: String::new(),
            severity,
            os_type,
            schema,
            default_value: None,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_setting(mut self, setting: impl Into<String>) -> Self {
        self.setting = setting.into();
        self
    }

    pub fn with_default(mut self, value: impl Into<ExpectedValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Validate a rulebook's expected value against this rule's schema
    pub fn validate_expected(&self, expected: &ExpectedValue) -> Result<()> {
        self.schema.validate(expected).map_err(|message| {
            Error::Validation(format!("rule {}: {}", self.id, message))
        })
    }
}

/// Shape of a rule's expected value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueSchema {
    Boolean,
    Enum {
        options: Vec<String>,
    },
    IntegerRange {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    List {
        /// Universe of items a list may contain; empty means unrestricted
        #[serde(default)]
        allowed: Vec<String>,
    },
    Text {
        /// Regular expression every expected text must match
        #[serde(default)]
        pattern: Option<String>,
    },
}

impl ValueSchema {
    /// Infer the most permissive schema consistent with a sample value
    pub fn infer(sample: &ExpectedValue) -> Self {
        match sample {
            ExpectedValue::Range { .. } | ExpectedValue::Exact(SettingValue::Integer(_)) => {
                ValueSchema::IntegerRange {
                    min: None,
                    max: None,
                }
            }
            ExpectedValue::Exact(SettingValue::Bool(_)) => ValueSchema::Boolean,
            ExpectedValue::Exact(SettingValue::Text(_)) => ValueSchema::Text { pattern: None },
            ExpectedValue::Exact(SettingValue::List(_)) => ValueSchema::List {
                allowed: Vec::new(),
            },
        }
    }

    /// Check that an expected value fits this schema
    pub fn validate(&self, expected: &ExpectedValue) -> std::result::Result<(), String> {
        match (self, expected) {
            (ValueSchema::Boolean, ExpectedValue::Exact(SettingValue::Bool(_))) => Ok(()),

            (ValueSchema::Enum { options }, ExpectedValue::Exact(SettingValue::Text(v))) => {
                if options.iter().any(|o| o == v) {
                    Ok(())
                } else {
                    Err(format!("'{}' is not one of [{}]", v, options.join(", ")))
                }
            }

            (ValueSchema::IntegerRange { min, max }, ExpectedValue::Exact(SettingValue::Integer(v))) => {
                check_bounds(*v, *min, *max)
            }

            (ValueSchema::IntegerRange { min, max }, ExpectedValue::Range { min: lo, max: hi }) => {
                if lo.is_none() && hi.is_none() {
                    return Err("range needs at least one bound".to_string());
                }
                if let (Some(lo), Some(hi)) = (lo, hi) {
                    if lo > hi {
                        return Err(format!("range {}..{} is empty", lo, hi));
                    }
                }
                if let Some(lo) = lo {
                    check_bounds(*lo, *min, *max)?;
                }
                if let Some(hi) = hi {
                    check_bounds(*hi, *min, *max)?;
                }
                Ok(())
            }

            (ValueSchema::List { allowed }, ExpectedValue::Exact(SettingValue::List(items))) => {
                match items.iter().find(|i| !allowed.is_empty() && !allowed.contains(*i)) {
                    Some(item) => Err(format!("list item '{}' is not allowed", item)),
                    None => Ok(()),
                }
            }

            (ValueSchema::Text { pattern }, ExpectedValue::Exact(SettingValue::Text(v))) => {
                match pattern {
                    None => Ok(()),
                    Some(p) => {
                        let re = regex::Regex::new(p)
                            .map_err(|e| format!("invalid schema pattern '{}': {}", p, e))?;
                        if re.is_match(v) {
                            Ok(())
                        } else {
                            Err(format!("'{}' does not match pattern '{}'", v, p))
                        }
                    }
                }
            }

            (schema, value) => Err(format!(
                "expected a {} value, got {}",
                schema.type_name(),
                value_kind(value)
            )),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ValueSchema::Boolean => "boolean",
            ValueSchema::Enum { .. } => "enum",
            ValueSchema::IntegerRange { .. } => "integer",
            ValueSchema::List { .. } => "list",
            ValueSchema::Text { .. } => "text",
        }
    }
}

fn check_bounds(v: i64, min: Option<i64>, max: Option<i64>) -> std::result::Result<(), String> {
    if let Some(lo) = min {
        if v < lo {
            return Err(format!("{} is below the minimum {}", v, lo));
        }
    }
    if let Some(hi) = max {
        if v > hi {
            return Err(format!("{} is above the maximum {}", v, hi));
        }
    }
    Ok(())
}

fn value_kind(value: &ExpectedValue) -> &'static str {
    match value {
        ExpectedValue::Range { .. } => "range",
        ExpectedValue::Exact(v) => v.kind(),
    }
}
