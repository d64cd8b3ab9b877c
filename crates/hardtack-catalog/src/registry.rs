//! Rule catalog - index of all known hardening rules

use hardtack_core::{Error, OsType, Result, Rule, Severity};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry of every rule a rulebook may reference
///
/// Rules are immutable once registered. The catalog is built at startup and
/// shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    /// Rules indexed by ID
    rules: BTreeMap<String, Arc<Rule>>,
}

impl RuleCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule; an id that is already taken is a `Conflict`
    pub fn register(&mut self, rule: Rule) -> Result<()> {
        if self.rules.contains_key(&rule.id) {
            return Err(Error::Conflict(format!(
                "rule {} is already registered",
                rule.id
            )));
        }
        self.rules.insert(rule.id.clone(), Arc::new(rule));
        Ok(())
    }

    /// Get a rule by ID
    pub fn get(&self, id: &str) -> Option<Arc<Rule>> {
        self.rules.get(id).cloned()
    }

    /// Get a rule by ID or fail with `NotFound`
    pub fn require(&self, id: &str) -> Result<Arc<Rule>> {
        self.get(id).ok_or_else(|| Error::not_found("rule", id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rules.contains_key(id)
    }

    /// All rule IDs in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(|s| s.as_str())
    }

    pub fn all(&self) -> impl Iterator<Item = Arc<Rule>> + '_ {
        self.rules.values().cloned()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Filter rules by target platform
    pub fn by_os(&self, os_type: OsType) -> Vec<Arc<Rule>> {
        self.rules
            .values()
            .filter(|r| r.os_type == os_type)
            .cloned()
            .collect()
    }

    /// Filter rules by minimum severity
    pub fn by_min_severity(&self, min_severity: Severity) -> Vec<Arc<Rule>> {
        self.rules
            .values()
            .filter(|r| r.severity >= min_severity)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hardtack_core::ValueSchema;

    fn rule(id: &str, severity: Severity, os_type: OsType) -> Rule {
        Rule::new(id, id, severity, os_type, ValueSchema::Boolean)
    }

    #[test]
    fn test_catalog() {
        let mut catalog = RuleCatalog::new();
        catalog
            .register(rule("RULE-101", Severity::High, OsType::Linux))
            .unwrap();

        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("RULE-101").is_some());
        assert!(catalog.get("INVALID").is_none());
        assert!(matches!(
            catalog.require("INVALID"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut catalog = RuleCatalog::new();
        catalog
            .register(rule("RULE-101", Severity::High, OsType::Linux))
            .unwrap();
        let err = catalog
            .register(rule("RULE-101", Severity::Low, OsType::Linux))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(catalog.require("RULE-101").unwrap().severity, Severity::High);
    }

    #[test]
    fn test_filters() {
        let mut catalog = RuleCatalog::new();
        catalog.register(rule("A", Severity::High, OsType::Linux)).unwrap();
        catalog.register(rule("B", Severity::Low, OsType::Linux)).unwrap();
        catalog.register(rule("C", Severity::Medium, OsType::Windows)).unwrap();

        assert_eq!(catalog.by_os(OsType::Linux).len(), 2);
        assert_eq!(catalog.by_min_severity(Severity::Medium).len(), 2);
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    }
}
