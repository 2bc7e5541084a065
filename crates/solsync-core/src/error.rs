//! Error types for solsync-core

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using solsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Reason a captured solution was rejected by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ValidationFailure {
    /// Nothing but whitespace was captured
    Empty,
    /// Shorter than the minimum length, usually an untouched template
    TooShort { length: usize, minimum: usize },
    /// Failed the coarse structural check for the language
    PatternMismatch { language: String },
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "code is empty"),
            Self::TooShort { length, minimum } => write!(
                f,
                "code is too short ({length} characters, minimum {minimum})"
            ),
            Self::PatternMismatch { language } => {
                write!(f, "code does not look like valid {language}")
            }
        }
    }
}

/// Errors that can occur in solsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Every capture strategy failed on every attempt
    #[error("Could not capture code after {attempts} attempt(s); copy it manually")]
    CaptureExhausted { attempts: u32, requires_manual: bool },

    /// Captured text was rejected
    #[error("Validation failed: {0}")]
    ValidationFailed(ValidationFailure),

    /// A write was blocked before it reached the store
    #[error("Storage quota exceeded: {required} bytes needed, quota is {quota} bytes")]
    StorageQuotaExceeded { required: usize, quota: usize },

    /// An operation waited too long for its turn in the storage queue
    #[error("Storage queue operation #{seq} timed out after {waited:?}")]
    StorageQueueTimeout { seq: u64, waited: Duration },

    /// Connectivity reports offline
    #[error("Offline: sync postponed until connectivity returns")]
    Offline,

    /// A remote request exceeded its deadline and was aborted
    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),

    /// Remote API rate limit hit
    #[error("Rate limited by remote API{}", format_retry_after(*.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    /// Bearer credential expired or was revoked
    #[error("Authorization expired; re-authorize with `solsync auth login`")]
    AuthExpired,

    /// Remote repository or path does not exist
    #[error("Remote resource not found: {0}")]
    RemoteNotFound(String),

    /// Credential lacks access to the target
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Non-classified remote API failure
    #[error("Remote API error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Transport-level HTTP failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Submission already present
    #[error("Duplicate submission for {0}")]
    Duplicate(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Submission not found
    #[error("Submission not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage backend or queue failure
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Coarse classification of an [`Error`], stable enough to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CaptureExhausted,
    ValidationFailed,
    StorageQuotaExceeded,
    StorageQueueTimeout,
    Offline,
    RequestTimeout,
    RateLimited,
    AuthExpired,
    RemoteNotFound,
    PermissionDenied,
    Server,
    Network,
    Duplicate,
    NotFound,
    InvalidInput,
    Storage,
}

impl ErrorKind {
    /// Stable snake_case label, matching the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CaptureExhausted => "capture_exhausted",
            Self::ValidationFailed => "validation_failed",
            Self::StorageQuotaExceeded => "storage_quota_exceeded",
            Self::StorageQueueTimeout => "storage_queue_timeout",
            Self::Offline => "offline",
            Self::RequestTimeout => "request_timeout",
            Self::RateLimited => "rate_limited",
            Self::AuthExpired => "auth_expired",
            Self::RemoteNotFound => "remote_not_found",
            Self::PermissionDenied => "permission_denied",
            Self::Server => "server",
            Self::Network => "network",
            Self::Duplicate => "duplicate",
            Self::NotFound => "not_found",
            Self::InvalidInput => "invalid_input",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CaptureExhausted { .. } => ErrorKind::CaptureExhausted,
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::StorageQuotaExceeded { .. } => ErrorKind::StorageQuotaExceeded,
            Self::StorageQueueTimeout { .. } => ErrorKind::StorageQueueTimeout,
            Self::Offline => ErrorKind::Offline,
            Self::RequestTimeout(_) => ErrorKind::RequestTimeout,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::AuthExpired => ErrorKind::AuthExpired,
            Self::RemoteNotFound(_) => ErrorKind::RemoteNotFound,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::Remote { status, .. } if *status >= 500 || matches!(*status, 408 | 409) => {
                ErrorKind::Server
            }
            Self::Remote { .. } => ErrorKind::InvalidInput,
            Self::Http(error) if error.is_timeout() => ErrorKind::RequestTimeout,
            Self::Http(_) => ErrorKind::Network,
            Self::Duplicate(_) => ErrorKind::Duplicate,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::LibSql(_) | Self::Io(_) | Self::Serialization(_) | Self::Storage(_) => {
                ErrorKind::Storage
            }
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RequestTimeout | ErrorKind::Server | ErrorKind::Network
        )
    }

    /// Whether the error must be surfaced without any retry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AuthExpired
                | ErrorKind::PermissionDenied
                | ErrorKind::RemoteNotFound
                | ErrorKind::InvalidInput
        )
    }

    /// Server-provided wait hint for rate-limit errors.
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

fn format_retry_after(retry_after: Option<Duration>) -> String {
    retry_after.map_or_else(String::new, |wait| {
        format!("; retry after {}s", wait.as_secs())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_and_transient_are_disjoint() {
        let errors = [
            Error::AuthExpired,
            Error::PermissionDenied("repo".to_string()),
            Error::RemoteNotFound("repo".to_string()),
            Error::RequestTimeout(Duration::from_secs(1)),
            Error::Remote {
                status: 502,
                message: "bad gateway".to_string(),
            },
            Error::RateLimited { retry_after: None },
            Error::Offline,
        ];
        for error in errors {
            assert!(
                !(error.is_terminal() && error.is_transient()),
                "{error} is both terminal and transient"
            );
        }
    }

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        let server = Error::Remote {
            status: 503,
            message: "unavailable".to_string(),
        };
        let client = Error::Remote {
            status: 422,
            message: "sha mismatch".to_string(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(client.is_terminal());
    }

    #[test]
    fn rate_limited_message_includes_hint() {
        let error = Error::RateLimited {
            retry_after: Some(Duration::from_secs(42)),
        };
        assert_eq!(error.retry_after(), Some(Duration::from_secs(42)));
        assert!(error.to_string().contains("retry after 42s"));
        assert!(!error.is_terminal());
    }

    #[test]
    fn validation_failure_reasons_are_distinct() {
        assert_eq!(ValidationFailure::Empty.to_string(), "code is empty");
        assert!(ValidationFailure::TooShort {
            length: 3,
            minimum: 10
        }
        .to_string()
        .contains("too short"));
        assert!(ValidationFailure::PatternMismatch {
            language: "python3".to_string()
        }
        .to_string()
        .contains("python3"));
    }

    #[test]
    fn error_kind_serializes_as_snake_case() {
        let json = serde_json::to_string(&ErrorKind::StorageQuotaExceeded).unwrap();
        assert_eq!(json, "\"storage_quota_exceeded\"");
        assert_eq!(ErrorKind::AuthExpired.to_string(), "auth_expired");
    }
}
