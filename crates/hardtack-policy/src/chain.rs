//! Rulebook chain - versioned, tamper-evident rulebook history per admin scope

use chrono::Utc;
use hardtack_catalog::RuleCatalog;
use hardtack_common::canonical_hash;
use hardtack_core::{
    BaselineLevel, ChainScope, Error, ExpectedValue, Result, RulebookContent, RulebookStatus,
    RulebookStore, RulebookVersion, RulebookVersionId,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Publishes and rolls back rulebook versions
///
/// Each (admin, level) scope holds one linear chain: every version's
/// `parent_hash` is the `content_hash` of the version before it. All writes
/// go through a single-writer lock so linkage is never computed against a
/// stale head.
pub struct RulebookChain {
    catalog: Arc<RuleCatalog>,
    store: Arc<dyn RulebookStore>,
    writer: Mutex<()>,
}

impl RulebookChain {
    pub fn new(catalog: Arc<RuleCatalog>, store: Arc<dyn RulebookStore>) -> Self {
        Self {
            catalog,
            store,
            writer: Mutex::new(()),
        }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    fn write_lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.writer
            .lock()
            .map_err(|_| Error::Internal("rulebook writer lock poisoned".into()))
    }

    /// Publish a new rulebook version for `admin` at `baseline_level`
    ///
    /// The new version becomes active and the previously active one is
    /// deprecated.
    pub fn publish(
        &self,
        content: RulebookContent,
        baseline_level: &str,
        admin: &str,
    ) -> Result<RulebookVersion> {
        let level: BaselineLevel = baseline_level.parse()?;
        let _guard = self.write_lock()?;
        self.publish_locked(content, level, admin)
    }

    /// Publish a new version equal to the active one with a single rule changed or added
    pub fn amend(
        &self,
        admin: &str,
        baseline_level: &str,
        rule_id: &str,
        value: ExpectedValue,
    ) -> Result<RulebookVersion> {
        let level: BaselineLevel = baseline_level.parse()?;
        let _guard = self.write_lock()?;

        let scope = ChainScope::new(admin, level);
        let active = active_in(&self.store.versions_in_scope(&scope)?)
            .cloned()
            .ok_or_else(|| Error::not_found("active rulebook", scope.to_string()))?;

        let content = active.content.with_rule(rule_id, value);
        self.publish_locked(content, level, admin)
    }

    fn publish_locked(
        &self,
        content: RulebookContent,
        level: BaselineLevel,
        admin: &str,
    ) -> Result<RulebookVersion> {
        if admin.trim().is_empty() {
            return Err(Error::Validation("admin id must not be empty".into()));
        }
        if content.baseline_level != level {
            return Err(Error::Validation(format!(
                "content is for level {} but was published as {}",
                content.baseline_level, level
            )));
        }
        self.validate_content(&content)?;

        let scope = ChainScope::new(admin, level);
        let versions = self.store.versions_in_scope(&scope)?;
        verify_versions(&scope, &versions)?;

        let content_hash = canonical_hash(&content)?;
        let head = versions.last();
        let active = active_in(&versions);

        if head.map_or(false, |v| v.content_hash == content_hash)
            || active.map_or(false, |v| v.content_hash == content_hash)
        {
            return Err(Error::Conflict(format!(
                "content {} is already published in {}",
                short(&content_hash),
                scope
            )));
        }

        let version = RulebookVersion {
            id: RulebookVersionId(0),
            admin_id: admin.to_string(),
            version: head.map_or(1, |v| v.version + 1),
            baseline_level: level,
            content,
            content_hash,
            parent_hash: head.map(|v| v.content_hash.clone()).unwrap_or_default(),
            status: RulebookStatus::Active,
            created_at: Utc::now(),
            created_by: admin.to_string(),
        };

        let updates: Vec<(RulebookVersionId, RulebookStatus)> = active
            .map(|v| vec![(v.id, RulebookStatus::Deprecated)])
            .unwrap_or_default();

        let committed = self.store.commit_version(version, &updates)?;
        info!(
            scope = %scope,
            id = %committed.id,
            version = committed.version,
            hash = short(&committed.content_hash),
            rules = committed.content.len(),
            "Published rulebook"
        );
        Ok(committed)
    }

    fn validate_content(&self, content: &RulebookContent) -> Result<()> {
        if content.is_empty() {
            return Err(Error::Validation("rulebook contains no rules".into()));
        }
        for (rule_id, expected) in &content.rules {
            let rule = self
                .catalog
                .get(rule_id)
                .ok_or_else(|| Error::Validation(format!("unknown rule {}", rule_id)))?;
            rule.validate_expected(expected)?;
        }
        Ok(())
    }

    /// Make `version_id` the active version of its scope again
    ///
    /// Every later version in the scope is marked rolled back. Rolling back
    /// to the version that is already active returns it unchanged.
    pub fn rollback(&self, version_id: RulebookVersionId) -> Result<RulebookVersion> {
        let _guard = self.write_lock()?;

        let target = self
            .store
            .get_version(version_id)?
            .ok_or_else(|| Error::not_found("rulebook version", version_id.to_string()))?;

        if target.status == RulebookStatus::RolledBack {
            return Err(Error::Conflict(format!(
                "{} was already rolled back",
                version_id
            )));
        }
        if target.is_active() {
            debug!(id = %version_id, "Rollback target is already active");
            return Ok(target);
        }

        let scope = target.scope();
        let versions = self.store.versions_in_scope(&scope)?;
        verify_versions(&scope, &versions)?;

        let mut updates = vec![(target.id, RulebookStatus::Active)];
        for v in &versions {
            if v.version > target.version && v.status != RulebookStatus::RolledBack {
                updates.push((v.id, RulebookStatus::RolledBack));
            } else if v.version < target.version && v.is_active() {
                updates.push((v.id, RulebookStatus::Deprecated));
            }
        }
        self.store.set_statuses(&updates)?;

        info!(
            scope = %scope,
            id = %target.id,
            version = target.version,
            updated = updates.len(),
            "Rolled back rulebook"
        );

        self.get(target.id)
    }

    /// The active version for an admin scope, if any
    pub fn active(&self, admin: &str, level: BaselineLevel) -> Result<Option<RulebookVersion>> {
        let versions = self.store.versions_in_scope(&ChainScope::new(admin, level))?;
        Ok(active_in(&versions).cloned())
    }

    /// Active versions of a level across all admins, ordered by admin
    pub fn active_for_level(&self, level: BaselineLevel) -> Result<Vec<RulebookVersion>> {
        let mut active: Vec<RulebookVersion> = self
            .store
            .all_versions()?
            .into_iter()
            .filter(|v| v.baseline_level == level && v.is_active())
            .collect();
        active.sort_by(|a, b| a.admin_id.cmp(&b.admin_id));
        Ok(active)
    }

    /// Every version in a scope, oldest first
    pub fn history(&self, admin: &str, level: BaselineLevel) -> Result<Vec<RulebookVersion>> {
        self.store.versions_in_scope(&ChainScope::new(admin, level))
    }

    pub fn get(&self, version_id: RulebookVersionId) -> Result<RulebookVersion> {
        self.store
            .get_version(version_id)?
            .ok_or_else(|| Error::not_found("rulebook version", version_id.to_string()))
    }

    /// Recompute every hash and link in a scope
    pub fn verify(&self, admin: &str, level: BaselineLevel) -> Result<()> {
        let scope = ChainScope::new(admin, level);
        verify_versions(&scope, &self.store.versions_in_scope(&scope)?)
    }
}

fn active_in(versions: &[RulebookVersion]) -> Option<&RulebookVersion> {
    versions.iter().find(|v| v.is_active())
}

fn short(hash: &str) -> &str {
    &hash[..hash.len().min(12)]
}

/// Check content hashes, parent links, numbering and the single-active rule
fn verify_versions(scope: &ChainScope, versions: &[RulebookVersion]) -> Result<()> {
    let mut previous: Option<&RulebookVersion> = None;
    let mut active = 0usize;

    for v in versions {
        let recomputed = canonical_hash(&v.content)?;
        if recomputed != v.content_hash {
            warn!(scope = %scope, version = v.version, "Rulebook content hash mismatch");
            return Err(Error::Conflict(format!(
                "{} version {} content does not match its hash",
                scope, v.version
            )));
        }

        let (expected_number, expected_parent) = match previous {
            Some(p) => (p.version + 1, p.content_hash.as_str()),
            None => (1, ""),
        };
        if v.version != expected_number {
            return Err(Error::Conflict(format!(
                "{} version {} follows version {}",
                scope,
                v.version,
                expected_number - 1
            )));
        }
        if v.parent_hash != expected_parent {
            warn!(scope = %scope, version = v.version, "Rulebook chain link broken");
            return Err(Error::Conflict(format!(
                "{} version {} does not link to its predecessor",
                scope, v.version
            )));
        }

        if v.is_active() {
            active += 1;
        }
        previous = Some(v);
    }

    if active > 1 {
        return Err(Error::Conflict(format!(
            "{} has {} active versions",
            scope, active
        )));
    }
    Ok(())
}
