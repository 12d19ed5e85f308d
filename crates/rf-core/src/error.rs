//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A configured or requested domain could not be normalized
    #[error("Invalid domain {input:?}: {reason}")]
    InvalidDomain { input: String, reason: String },

    /// Invalid field value
    #[error("Invalid {field}: {value} (expected {expected})")]
    InvalidFieldValue {
        field: String,
        value: String,
        expected: String,
    },

    /// A persisted record failed validation
    #[error("Invalid {record} record: {reason}")]
    InvalidRecord { record: String, reason: String },
}

impl DomainError {
    pub(crate) fn invalid_domain(input: &str, reason: &str) -> Self {
        Self::InvalidDomain {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_record(record: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            record: record.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
