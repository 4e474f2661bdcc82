//! Errors raised by the pure domain computations

use thiserror::Error;

/// Domain error shared by every engine module
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0} not found")]
    NotFound(String),
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result alias for domain computations
pub type DomainResult<T> = Result<T, DomainError>;
