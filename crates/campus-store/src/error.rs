//! Error types for store operations

use campus_org::DomainError;
use thiserror::Error;

use crate::config::ConfigError;

/// Store error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A domain rule rejected the operation before anything was written
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Lookup by id, code or path found nothing
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity kind (e.g. "academic unit")
        entity: &'static str,
        /// Key that was looked up
        key: String,
    },

    /// Uniqueness violation (duplicate id, code or path)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Store could not be configured or opened
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Opaque backend failure
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Shorthand for a missing entity.
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Shorthand for a uniqueness violation.
    pub fn conflict(message: impl Into<String>) -> Self {
        StoreError::Conflict(message.into())
    }

    /// Check if this is a not-found error from either layer.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound { .. } | StoreError::Domain(DomainError::NotFound { .. })
        )
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::Domain(e) => e.status_code(),
            StoreError::NotFound { .. } => 404,
            StoreError::Conflict(_) => 409,
            StoreError::Configuration(_) | StoreError::Storage(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::Domain(e) => e.error_code(),
            StoreError::NotFound { .. } => "NOT_FOUND",
            StoreError::Conflict(_) => "CONFLICT",
            StoreError::Configuration(_) => "CONFIGURATION_ERROR",
            StoreError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Check if this is a server-side failure (logged at error level).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(msg.clone().unwrap_or_else(|| err.to_string()))
            }
            _ => StoreError::Storage(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(StoreError::not_found("school", "x").status_code(), 404);
        assert_eq!(StoreError::conflict("dup").status_code(), 409);
        assert_eq!(StoreError::Storage("disk".into()).status_code(), 500);
        assert_eq!(StoreError::from(DomainError::validation("bad")).status_code(), 400);
        assert_eq!(StoreError::from(DomainError::business("no")).status_code(), 422);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(StoreError::conflict("dup").error_code(), "CONFLICT");
        assert_eq!(StoreError::Storage("x".into()).error_code(), "STORAGE_ERROR");
        assert_eq!(
            StoreError::from(DomainError::business("no")).error_code(),
            DomainError::business("no").error_code()
        );
    }

    #[test]
    fn test_is_not_found_covers_both_layers() {
        assert!(StoreError::not_found("academic unit", "abc").is_not_found());
        assert!(StoreError::from(DomainError::not_found("school", "abc")).is_not_found());
        assert!(!StoreError::conflict("dup").is_not_found());
    }

    #[test]
    fn test_domain_errors_display_unchanged() {
        let err = StoreError::from(DomainError::business("unit cannot be its own parent"));
        assert_eq!(
            err.to_string(),
            "business rule violation: unit cannot be its own parent"
        );
    }

    #[test]
    fn test_is_server_error() {
        assert!(StoreError::Storage("x".into()).is_server_error());
        assert!(!StoreError::conflict("x").is_server_error());
    }
}
