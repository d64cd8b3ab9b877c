//! Device to rulebook bindings

use crate::rulebook::RulebookVersionId;
use crate::severity::BaselineLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Binds one device to one rulebook version
///
/// A device has at most one assignment. Writing a new one supersedes the old.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub device_id: String,
    pub rulebook_version_id: RulebookVersionId,
    pub baseline_level: BaselineLevel,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: String,
}
