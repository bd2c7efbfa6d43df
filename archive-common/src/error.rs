//! Common error types for the archive services

use thiserror::Error;

/// Common result type for archive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared across the archive services
///
/// `Validation` carries the field it names so callers can surface a
/// structured correction prompt ("Fandom is missing.") instead of a generic
/// failure. `Conflict` is the retriable optimistic-concurrency outcome;
/// `Timeout` is the retriable external-fetch outcome.
#[derive(Error, Debug)]
pub enum Error {
    /// A field failed validation; names the field and the reason
    #[error("{field}: {reason}")]
    Validation { field: String, reason: String },

    /// Concurrent modification detected by the store (retriable)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// External operation exceeded its time bound (retriable)
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Acting principal is not permitted to perform the operation
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for field validation failures
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for error classes the user can retry without changing the request
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_the_field() {
        let err = Error::validation("fandom", "Fandom is missing.");
        assert_eq!(err.to_string(), "fandom: Fandom is missing.");
    }

    #[test]
    fn conflict_and_timeout_are_retriable() {
        assert!(Error::Conflict("version mismatch".into()).is_retriable());
        assert!(Error::Timeout("import fetch".into()).is_retriable());
        assert!(!Error::NotFound("work".into()).is_retriable());
    }
}
