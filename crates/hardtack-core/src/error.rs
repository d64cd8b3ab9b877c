//! Error types for the Hardtack engine

use thiserror::Error;

/// Result type alias using Hardtack Error
pub type Result<T> = std::result::Result<T, Error>;

/// Hardtack error types
#[derive(Error, Debug)]
pub enum Error {
    // === Input Errors ===
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    // === Chain Errors ===
    #[error("Conflict: {0}")]
    Conflict(String),

    // === Evaluation Errors ===
    #[error("No platform adapter registered for {os_type} (rule {rule_id})")]
    UnsupportedPlatform { os_type: String, rule_id: String },

    #[error("Execution failed for {rule_id} on {device_id}: {message}")]
    Execution {
        device_id: String,
        rule_id: String,
        message: String,
    },

    #[error("{operation} timed out after {after_ms}ms ({rule_id} on {device_id})")]
    Timeout {
        operation: &'static str,
        device_id: String,
        rule_id: String,
        after_ms: u64,
    },

    #[error("Device unreachable: {device_id}")]
    Unreachable { device_id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Operation cancelled: {reason}")]
    Cancelled { reason: String },

    // === Storage Errors ===
    #[error("Storage error: {0}")]
    Storage(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Only transient adapter causes qualify. Validation and sequencing errors never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Unreachable { .. })
    }

    /// Check if this error is fatal to the operation that raised it
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::Conflict(_)
                | Error::InvalidState(_)
                | Error::Configuration(_)
                | Error::InvalidConfig { .. }
        )
    }

    /// Get an error code for logging
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::Conflict(_) => "CONFLICT",
            Error::UnsupportedPlatform { .. } => "UNSUPPORTED_PLATFORM",
            Error::Execution { .. } => "EXECUTION_ERROR",
            Error::Timeout { .. } => "TIMEOUT",
            Error::Unreachable { .. } => "UNREACHABLE",
            Error::InvalidState(_) => "INVALID_STATE",
            Error::Cancelled { .. } => "CANCELLED",
            Error::Storage(_) => "STORAGE_ERROR",
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::InvalidConfig { .. } => "INVALID_CONFIG",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_retry() {
        let timeout = Error::Timeout {
            operation: "read",
            device_id: "host-1".into(),
            rule_id: "RULE-205".into(),
            after_ms: 500,
        };
        assert!(timeout.is_retryable());
        assert!(Error::Unreachable {
            device_id: "host-1".into()
        }
        .is_retryable());

        assert!(!Error::Validation("bad".into()).is_retryable());
        assert!(!Error::InvalidState("no rollback value".into()).is_retryable());
        assert!(!Error::Execution {
            device_id: "host-1".into(),
            rule_id: "RULE-101".into(),
            message: "permission denied".into(),
        }
        .is_retryable());
    }

    #[test]
    fn test_error_codes_and_display() {
        let err = Error::not_found("rulebook", "strict");
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.to_string(), "rulebook not found: strict");
        assert!(Error::Conflict("fork".into()).is_fatal());
        assert!(!err.is_fatal());
    }
}
