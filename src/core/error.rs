//! Error types for MCPShield

use thiserror::Error;

/// Convenience Result type for MCPShield operations
pub type Result<T> = std::result::Result<T, ShieldError>;

/// Process exit code for success.
pub const EXIT_OK: i32 = 0;
/// Process exit code for general failures (drift, policy block, download error).
pub const EXIT_FAILURE: i32 = 1;
/// Process exit code for user errors (bad input, missing files, offline miss).
pub const EXIT_USER_ERROR: i32 = 2;
/// Process exit code for unexpected internal errors.
pub const EXIT_UNEXPECTED: i32 = 3;

#[derive(Error, Debug)]
pub enum ShieldError {
    #[error("{0}")]
    User(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {message}")]
    Network {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Integrity mismatch for {subject}: expected {expected}, got {actual}")]
    Integrity {
        subject: String,
        expected: String,
        actual: String,
    },

    #[error("Artifact exceeds size limit: {actual} bytes (cap {limit})")]
    SizeLimit { actual: u64, limit: u64 },

    #[error("Unsafe archive entry: {0}")]
    PathTraversal(String),

    #[error("Policy violation [{code}]: {reason}")]
    PolicyViolation { code: String, reason: String },

    #[error("Offline mode: {0}")]
    Offline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ShieldError {
    /// Map an error kind onto the CLI exit-code contract.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) | Self::NotFound(_) | Self::Offline(_) => EXIT_USER_ERROR,
            Self::Network { .. }
            | Self::Integrity { .. }
            | Self::SizeLimit { .. }
            | Self::PathTraversal(_)
            | Self::PolicyViolation { .. } => EXIT_FAILURE,
            Self::Io(_) | Self::Unexpected(_) => EXIT_UNEXPECTED,
        }
    }

    /// True when a caller may reasonably retry the operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

impl From<reqwest::Error> for ShieldError {
    fn from(err: reqwest::Error) -> Self {
        if err.status().is_some_and(|s| s.as_u16() == 404) {
            return Self::NotFound(err.to_string());
        }
        Self::Network {
            message: err.to_string(),
            status_code: err.status().map(|s| s.as_u16()),
        }
    }
}

impl From<serde_json::Error> for ShieldError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unexpected(format!("JSON error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ShieldError::User("bad namespace".into()).exit_code(), 2);
        assert_eq!(ShieldError::NotFound("x".into()).exit_code(), 2);
        assert_eq!(ShieldError::Offline("cache miss".into()).exit_code(), 2);
        assert_eq!(
            ShieldError::Network {
                message: "timeout".into(),
                status_code: None
            }
            .exit_code(),
            1
        );
        assert_eq!(
            ShieldError::PathTraversal("../../evil".into()).exit_code(),
            1
        );
        assert_eq!(ShieldError::Unexpected("boom".into()).exit_code(), 3);
    }

    #[test]
    fn test_only_network_is_retryable() {
        assert!(
            ShieldError::Network {
                message: "reset".into(),
                status_code: Some(502)
            }
            .is_retryable()
        );
        assert!(!ShieldError::User("nope".into()).is_retryable());
        assert!(
            !ShieldError::Integrity {
                subject: "pkg".into(),
                expected: "a".into(),
                actual: "b".into()
            }
            .is_retryable()
        );
    }
}
