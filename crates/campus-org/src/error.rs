//! Error types for domain operations
//!
//! Every entity constructor, mutator and domain service validates eagerly and
//! returns the first violated rule before touching any state.

use thiserror::Error;

/// Domain error types.
///
/// `Validation` covers malformed or missing input, `BusinessRule` covers a
/// well-formed request that the hierarchy or membership policy forbids.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Malformed or missing input (empty name, bad identifier, ...)
    #[error("validation error: {0}")]
    Validation(String),

    /// Structurally valid request that violates domain policy
    #[error("business rule violation: {0}")]
    BusinessRule(String),

    /// Referenced entity is absent
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (e.g. "academic unit")
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    /// Shorthand for a business rule violation.
    pub fn business(message: impl Into<String>) -> Self {
        DomainError::BusinessRule(message.into())
    }

    /// Shorthand for a missing entity.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Human-readable message without the category prefix.
    pub fn message(&self) -> String {
        match self {
            DomainError::Validation(m) | DomainError::BusinessRule(m) => m.clone(),
            DomainError::NotFound { entity, id } => format!("{} not found: {}", entity, id),
        }
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            DomainError::Validation(_) => 400,
            DomainError::BusinessRule(_) => 422,
            DomainError::NotFound { .. } => 404,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "VALIDATION_ERROR",
            DomainError::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            DomainError::NotFound { .. } => "NOT_FOUND",
        }
    }
}
