//! Catalog loader - loads rule definitions from JSON files

use crate::builtin::builtin_catalog;
use crate::entry::CatalogEntry;
use crate::registry::RuleCatalog;
use hardtack_common::config::CatalogSection;
use hardtack_core::{Error, Result, Rule};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A catalog file that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of a lenient load
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Files read successfully
    pub files: usize,
    /// Rules registered from those files
    pub loaded: usize,
    pub errors: Vec<LoadError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Reads `*.json` rule files into a catalog
///
/// A file is all-or-nothing: if any entry in it is malformed or collides with
/// an id that is already registered, none of its rules are added. Lenient
/// loading records the failure and moves on; strict loading stops at it.
#[derive(Debug, Clone, Default)]
pub struct CatalogLoader {
    strict: bool,
}

impl CatalogLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Load every rule file under `dir` (recursively) into `catalog`
    pub fn load_into(&self, catalog: &mut RuleCatalog, dir: impl AsRef<Path>) -> Result<LoadReport> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::not_found("catalog directory", dir.display().to_string()));
        }

        info!("Loading rules from: {}", dir.display());
        let mut files = Vec::new();
        collect_json_files(dir, &mut files)?;
        files.sort();

        let mut report = LoadReport::default();
        for path in files {
            match load_file(catalog, &path) {
                Ok(count) => {
                    debug!("Loaded {} rules from {}", count, path.display());
                    report.files += 1;
                    report.loaded += count;
                }
                Err(e) if self.strict => {
                    return Err(Error::Validation(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )));
                }
                Err(e) => {
                    warn!("Failed to load rules from {}: {}", path.display(), e);
                    report.errors.push(LoadError {
                        path,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Loaded {} rules from {} files ({} failed)",
            report.loaded,
            report.files,
            report.errors.len()
        );
        Ok(report)
    }
}

/// Load a catalog from a directory alone
pub fn load_catalog_from_dir(dir: impl AsRef<Path>, strict: bool) -> Result<(RuleCatalog, LoadReport)> {
    let mut catalog = RuleCatalog::new();
    let report = CatalogLoader::new()
        .strict(strict)
        .load_into(&mut catalog, dir)?;
    Ok((catalog, report))
}

/// Build the catalog described by the `[catalog]` config section
///
/// Built-in rules go in first, so a file that redefines one of them is a
/// load error for that file.
pub fn load_catalog(config: &CatalogSection) -> Result<(RuleCatalog, LoadReport)> {
    let mut catalog = if config.include_builtin {
        builtin_catalog()?
    } else {
        RuleCatalog::new()
    };

    let report = match &config.dir {
        Some(dir) => CatalogLoader::new()
            .strict(config.strict)
            .load_into(&mut catalog, dir)?,
        None => LoadReport::default(),
    };

    Ok((catalog, report))
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_json_files(&path, out)?;
        } else if path.extension().map_or(false, |ext| ext == "json") {
            out.push(path);
        }
    }
    Ok(())
}

fn load_file(catalog: &mut RuleCatalog, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)?;
    let entries = CatalogEntry::parse_file(&content)?;

    let mut seen = HashSet::new();
    let mut rules: Vec<Rule> = Vec::with_capacity(entries.len());
    for entry in entries {
        let rule = entry.into_rule()?;
        if catalog.contains(&rule.id) || !seen.insert(rule.id.clone()) {
            return Err(Error::Conflict(format!("duplicate rule id {}", rule.id)));
        }
        rules.push(rule);
    }

    let count = rules.len();
    for rule in rules {
        catalog.register(rule)?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, body: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    const SSH_RULES: &str = r#"[
        {"rule_id": "RULE-101", "description": "Disable SSH root login", "severity": "High",
         "setting": "sshd.permit_root_login", "expected_value": false},
        {"rule_id": "RULE-102", "description": "Disable password auth", "severity": "Medium",
         "expected_value": false}
    ]"#;

    #[test]
    fn test_load_rules_from_dir() {
        let tmp_dir = TempDir::new().unwrap();
        write_file(tmp_dir.path(), "ssh.json", SSH_RULES);
        std::fs::create_dir(tmp_dir.path().join("windows")).unwrap();
        write_file(
            &tmp_dir.path().join("windows"),
            "guest.json",
            r#"[{"rule_id": "RULE-501", "description": "Disable guest", "severity": "high",
                 "os_type": "windows", "expected_value": false}]"#,
        );
        write_file(tmp_dir.path(), "notes.txt", "not a rule file");

        let (catalog, report) = load_catalog_from_dir(tmp_dir.path(), false).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(report.files, 2);
        assert_eq!(report.loaded, 3);
        assert!(report.is_clean());
    }

    #[test]
    fn test_bad_file_does_not_abort_others() {
        let tmp_dir = TempDir::new().unwrap();
        write_file(tmp_dir.path(), "a.json", SSH_RULES);
        write_file(tmp_dir.path(), "b.json", "{ not json");

        let (catalog, report) = load_catalog_from_dir(tmp_dir.path(), false).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].path.ends_with("b.json"));
    }

    #[test]
    fn test_strict_mode_fails_fast() {
        let tmp_dir = TempDir::new().unwrap();
        write_file(tmp_dir.path(), "a.json", SSH_RULES);
        write_file(tmp_dir.path(), "b.json", "{ not json");

        let err = load_catalog_from_dir(tmp_dir.path(), true).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_duplicate_across_files_rejects_later_file() {
        let tmp_dir = TempDir::new().unwrap();
        write_file(tmp_dir.path(), "a.json", SSH_RULES);
        write_file(
            tmp_dir.path(),
            "b.json",
            r#"[{"rule_id": "RULE-900", "description": "new", "severity": "low", "expected_value": 1},
                {"rule_id": "RULE-101", "description": "again", "severity": "low", "expected_value": true}]"#,
        );

        let (catalog, report) = load_catalog_from_dir(tmp_dir.path(), false).unwrap();
        assert_eq!(report.errors.len(), 1);
        assert!(!catalog.contains("RULE-900"));
        assert_eq!(
            catalog.get("RULE-101").unwrap().setting,
            "sshd.permit_root_login"
        );
    }

    #[test]
    fn test_missing_dir() {
        let err = load_catalog_from_dir("/nonexistent/hardtack/rules", false).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_load_from_config_merges_builtin() {
        let tmp_dir = TempDir::new().unwrap();
        write_file(
            tmp_dir.path(),
            "extra.json",
            r#"[{"rule_id": "SITE-001", "description": "Site rule", "severity": "low",
                 "expected_value": ["a", "b"]}]"#,
        );

        let config = CatalogSection {
            dir: Some(tmp_dir.path().display().to_string()),
            strict: true,
            include_builtin: true,
        };
        let (catalog, report) = load_catalog(&config).unwrap();
        assert!(catalog.contains("RULE-101"));
        assert!(catalog.contains("SITE-001"));
        assert_eq!(report.loaded, 1);
    }
}
