//! Adapter registry - platform adapter lookup by operating system

use hardtack_core::{Error, OsType, PlatformAdapter, Result, Rule};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registered platform adapters, at most one per operating system
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<OsType, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous one for the same OS
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        debug!(os = %adapter.os_type(), adapter = adapter.name(), "Registering platform adapter");
        self.adapters.insert(adapter.os_type(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn PlatformAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, os_type: OsType) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&os_type).cloned()
    }

    /// The adapter serving `rule`, or `UnsupportedPlatform`
    pub fn for_rule(&self, rule: &Rule) -> Result<Arc<dyn PlatformAdapter>> {
        self.get(rule.os_type).ok_or_else(|| Error::UnsupportedPlatform {
            os_type: rule.os_type.to_string(),
            rule_id: rule.id.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
