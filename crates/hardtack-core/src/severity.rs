//! Severity levels, target platforms and baseline tiers

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Severity of a hardening rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Low severity, minimal risk
    #[default]
    Low,
    /// Medium severity, moderate risk
    Medium,
    /// High severity, significant risk
    High,
}

impl Severity {
    /// Get numeric value for sorting/comparison
    pub fn as_number(&self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
        }
    }

    /// Get display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(Error::Validation(format!("unknown severity '{}'", other))),
        }
    }
}

/// Operating system a rule targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OsType {
    #[default]
    Linux,
    Windows,
}

impl OsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsType::Linux => "Linux",
            OsType::Windows => "Windows",
        }
    }
}

impl std::fmt::Display for OsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OsType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linux" => Ok(OsType::Linux),
            "windows" => Ok(OsType::Windows),
            other => Err(Error::Validation(format!("unknown os type '{}'", other))),
        }
    }
}

/// Named strictness tier used to select the rulebook a device follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineLevel {
    Basic,
    Moderate,
    Strict,
}

impl BaselineLevel {
    pub const ALL: [BaselineLevel; 3] = [
        BaselineLevel::Basic,
        BaselineLevel::Moderate,
        BaselineLevel::Strict,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BaselineLevel::Basic => "basic",
            BaselineLevel::Moderate => "moderate",
            BaselineLevel::Strict => "strict",
        }
    }
}

impl std::fmt::Display for BaselineLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BaselineLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(BaselineLevel::Basic),
            "moderate" => Ok(BaselineLevel::Moderate),
            "strict" => Ok(BaselineLevel::Strict),
            other => Err(Error::Validation(format!(
                "unknown baseline level '{}' (expected basic, moderate or strict)",
                other
            ))),
        }
    }
}
