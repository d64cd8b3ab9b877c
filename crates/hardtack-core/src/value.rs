//! Setting values and the typed comparison used to decide compliance

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// A configuration value as observed on, or written to, a device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Text(String),
    List(Vec<String>),
}

impl SettingValue {
    pub fn kind(&self) -> &'static str {
        match self {
            SettingValue::Bool(_) => "boolean",
            SettingValue::Integer(_) => "integer",
            SettingValue::Text(_) => "text",
            SettingValue::List(_) => "list",
        }
    }
}

impl std::fmt::Display for SettingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{}", b),
            SettingValue::Integer(n) => write!(f, "{}", n),
            SettingValue::Text(s) => write!(f, "{}", s),
            SettingValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Integer(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

/// The value a rulebook expects for a rule
///
/// Integer ranges are open-ended on a missing bound. Every other expectation
/// is an exact value, except lists, which are compared as allowed sets.
/// A JSON range must name `min`, `max` or both and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExpectedValue {
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    Exact(SettingValue),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RangeBounds {
    #[serde(default)]
    min: Option<i64>,
    #[serde(default)]
    max: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExpectedRepr {
    Range(RangeBounds),
    Exact(SettingValue),
}

impl<'de> Deserialize<'de> for ExpectedValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match ExpectedRepr::deserialize(deserializer)? {
            ExpectedRepr::Range(RangeBounds {
                min: None,
                max: None,
            }) => Err(D::Error::custom("range must set min, max or both")),
            ExpectedRepr::Range(RangeBounds { min, max }) => Ok(ExpectedValue::Range { min, max }),
            ExpectedRepr::Exact(value) => Ok(ExpectedValue::Exact(value)),
        }
    }
}

impl ExpectedValue {
    pub fn range(min: Option<i64>, max: Option<i64>) -> Self {
        ExpectedValue::Range { min, max }
    }

    /// Whether an observed value satisfies this expectation
    pub fn matches(&self, current: &SettingValue) -> bool {
        match (self, current) {
            (ExpectedValue::Range { min, max }, SettingValue::Integer(v)) => {
                min.map_or(true, |lo| *v >= lo) && max.map_or(true, |hi| *v <= hi)
            }
            (ExpectedValue::Range { .. }, _) => false,
            (ExpectedValue::Exact(SettingValue::List(allowed)), SettingValue::List(items)) => {
                let allowed: BTreeSet<&String> = allowed.iter().collect();
                items.iter().all(|item| allowed.contains(item))
            }
            (ExpectedValue::Exact(expected), current) => expected == current,
        }
    }

    /// The value to write so that a device ends up satisfying this expectation
    ///
    /// Ranges clamp the observed integer. Lists keep the observed items that
    /// are allowed, falling back to the full allowed set when none are.
    pub fn remediation_target(&self, current: Option<&SettingValue>) -> SettingValue {
        match self {
            ExpectedValue::Range { min, max } => match current {
                Some(SettingValue::Integer(v)) => {
                    let mut target = *v;
                    if let Some(lo) = min {
                        target = target.max(*lo);
                    }
                    if let Some(hi) = max {
                        target = target.min(*hi);
                    }
                    SettingValue::Integer(target)
                }
                _ => SettingValue::Integer(min.or(*max).unwrap_or_default()),
            },
            ExpectedValue::Exact(SettingValue::List(allowed)) => {
                let kept: Vec<String> = match current {
                    Some(SettingValue::List(items)) => items
                        .iter()
                        .filter(|item| allowed.contains(item))
                        .cloned()
                        .collect(),
                    _ => Vec::new(),
                };
                if kept.is_empty() {
                    SettingValue::List(allowed.clone())
                } else {
                    SettingValue::List(kept)
                }
            }
            ExpectedValue::Exact(value) => value.clone(),
        }
    }
}

impl std::fmt::Display for ExpectedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpectedValue::Range { min, max } => {
                let lo = min.map(|v| v.to_string()).unwrap_or_default();
                let hi = max.map(|v| v.to_string()).unwrap_or_default();
                write!(f, "{}..{}", lo, hi)
            }
            ExpectedValue::Exact(value) => write!(f, "{}", value),
        }
    }
}

impl From<SettingValue> for ExpectedValue {
    fn from(value: SettingValue) -> Self {
        ExpectedValue::Exact(value)
    }
}

impl From<bool> for ExpectedValue {
    fn from(value: bool) -> Self {
        ExpectedValue::Exact(SettingValue::Bool(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_for_boolean_and_text() {
        let expected = ExpectedValue::from(false);
        assert!(expected.matches(&SettingValue::Bool(false)));
        assert!(!expected.matches(&SettingValue::Bool(true)));
        assert!(!expected.matches(&SettingValue::Text("false".into())));

        let expected = ExpectedValue::Exact(SettingValue::from("no"));
        assert!(expected.matches(&SettingValue::from("no")));
    }

    #[test]
    fn test_range_containment() {
        let expected = ExpectedValue::range(Some(1), Some(365));
        assert!(expected.matches(&SettingValue::Integer(90)));
        assert!(expected.matches(&SettingValue::Integer(365)));
        assert!(!expected.matches(&SettingValue::Integer(9999)));
        assert!(!expected.matches(&SettingValue::Text("90".into())));

        let open = ExpectedValue::range(Some(14), None);
        assert!(open.matches(&SettingValue::Integer(i64::MAX)));
    }

    #[test]
    fn test_list_subset() {
        let expected = ExpectedValue::Exact(SettingValue::List(vec![
            "aes256-gcm".into(),
            "chacha20-poly1305".into(),
        ]));
        assert!(expected.matches(&SettingValue::List(vec!["aes256-gcm".into()])));
        assert!(expected.matches(&SettingValue::List(vec![])));
        assert!(!expected.matches(&SettingValue::List(vec!["3des-cbc".into()])));
    }

    #[test]
    fn test_remediation_targets() {
        let range = ExpectedValue::range(Some(1), Some(365));
        assert_eq!(
            range.remediation_target(Some(&SettingValue::Integer(99999))),
            SettingValue::Integer(365)
        );
        assert_eq!(range.remediation_target(None), SettingValue::Integer(1));

        let list = ExpectedValue::Exact(SettingValue::List(vec!["a".into(), "b".into()]));
        assert_eq!(
            list.remediation_target(Some(&SettingValue::List(vec!["b".into(), "x".into()]))),
            SettingValue::List(vec!["b".into()])
        );
        assert_eq!(
            list.remediation_target(Some(&SettingValue::List(vec!["x".into()]))),
            SettingValue::List(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_untagged_json_shapes() {
        let range: ExpectedValue = serde_json::from_str(r#"{"min": 1, "max": 365}"#).unwrap();
        assert_eq!(range, ExpectedValue::range(Some(1), Some(365)));

        let exact: ExpectedValue = serde_json::from_str("false").unwrap();
        assert_eq!(exact, ExpectedValue::from(false));

        let list: ExpectedValue = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert!(matches!(list, ExpectedValue::Exact(SettingValue::List(_))));

        assert_eq!(
            serde_json::to_string(&ExpectedValue::range(None, Some(5))).unwrap(),
            r#"{"max":5}"#
        );
    }

    #[test]
    fn test_malformed_ranges_rejected() {
        assert!(serde_json::from_str::<ExpectedValue>(r#"{"foo": 1}"#).is_err());
        assert!(serde_json::from_str::<ExpectedValue>(r#"{"min": 1, "mx": 5}"#).is_err());
        assert!(serde_json::from_str::<ExpectedValue>("{}").is_err());

        let open: ExpectedValue = serde_json::from_str(r#"{"min": 14}"#).unwrap();
        assert_eq!(open, ExpectedValue::range(Some(14), None));
    }
}
