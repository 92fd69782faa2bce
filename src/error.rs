//! Error types
//!
//! [`CommandError`] is the single user-facing error kind: the CLI host catches
//! it at the top level, prints its message and exits non-zero.
//! [`BackendError`] describes a failure reported by a backend manager and
//! carries the backend's own name for the failure kind.

use thiserror::Error;

/// Kind name used by backends for a plain "no such resource" failure
pub const NOT_FOUND: &str = "NotFound";

/// Kind name used by HTTP backends for a 404 response
pub const HTTP_NOT_FOUND: &str = "HTTPNotFound";

/// Kind name for a lookup that matched more than one resource
pub const NO_UNIQUE_MATCH: &str = "NoUniqueMatch";

/// Kind name for an operation the manager does not implement
pub const UNSUPPORTED: &str = "Unsupported";

/// Kind name for transport-level failures (DNS, TLS, refused connection...)
pub const CONNECTION_FAILURE: &str = "ConnectionFailure";

/// Failure raised by a backend manager or status function
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct BackendError {
    kind: String,
    message: String,
}

impl BackendError {
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(NOT_FOUND, message)
    }

    pub fn no_unique_match(message: impl Into<String>) -> Self {
        Self::new(NO_UNIQUE_MATCH, message)
    }

    /// The manager does not implement `operation`
    pub fn unsupported(operation: &str) -> Self {
        Self::new(UNSUPPORTED, format!("operation '{}' is not supported", operation))
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(CONNECTION_FAILURE, message)
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            400 => "BadRequest",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => HTTP_NOT_FOUND,
            409 => "Conflict",
            413 | 429 => "OverLimit",
            501 => "HTTPNotImplemented",
            500..=599 => "ServiceUnavailable",
            _ => "ClientException",
        };
        Self::new(kind, message)
    }

    /// The backend's name for this failure kind
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// True when the kind is one of `markers`
    pub fn is_kind_in<S: AsRef<str>>(&self, markers: &[S]) -> bool {
        markers.iter().any(|m| m.as_ref() == self.kind)
    }

    /// True for the "not found" kinds every backend is expected to use
    pub fn is_not_found(&self) -> bool {
        self.is_kind_in(&[NOT_FOUND, HTTP_NOT_FOUND])
    }
}

/// User-facing command error
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Resource doesn't have field {field}")]
    FieldNotFound { field: String },

    #[error("No {kind} with a name or ID of '{token}' exists.")]
    NotFound { kind: String, token: String },

    #[error("More than one {kind} exists with the name or ID '{token}'.")]
    Ambiguous { kind: String, token: String },

    #[error("'<empty string>' is not a valid sort key")]
    InvalidSortKey,

    #[error(
        "'{direction}' is not a valid sort direction for sort key {key}, use 'asc' or 'desc' instead"
    )]
    InvalidSortDirection { key: String, direction: String },

    #[error("Error occurred trying to read from file {path}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl CommandError {
    pub fn field_not_found(field: &str) -> Self {
        Self::FieldNotFound {
            field: field.to_string(),
        }
    }
}
