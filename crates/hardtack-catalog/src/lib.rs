//! Hardtack Catalog - Rule registry, JSON rule loader, and built-in rules
//!
//! This crate provides:
//! - `RuleCatalog`: Index of every hardening rule a rulebook may reference
//! - `CatalogEntry`: The JSON shape of a rule in a catalog file
//! - Directory loader that merges rule files into one catalog
//! - The built-in baseline rule set

pub mod builtin;
pub mod entry;
pub mod loader;
pub mod registry;

pub use builtin::builtin_catalog;
pub use entry::CatalogEntry;
pub use loader::{load_catalog, load_catalog_from_dir, CatalogLoader, LoadError, LoadReport};
pub use registry::RuleCatalog;
