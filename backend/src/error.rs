//! Error handling for the Poultry Lot Management Platform
//!
//! Every error leaves the server as `{"error": {"code", "message", ...}}`.
//! Operations that are merely risky rather than invalid come back as
//! [`AppError::Blocked`] with the alternatives a client can offer instead.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::DomainError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Cross-organization access or a missing capability
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Blocked: {}", .0.message)]
    Blocked(Box<Blocked>),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { field, message } => AppError::Validation { field, message },
            DomainError::NotFound(resource) => AppError::NotFound(resource),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);
        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                AppError::validation(*field, message)
            }
            None => AppError::validation("body", "Invalid request body"),
        }
    }
}

/// An operation refused because of the current state of its target
#[derive(Debug, Clone, Serialize)]
pub struct Blocked {
    #[serde(skip)]
    pub code: &'static str,
    #[serde(skip)]
    pub message: String,
    /// Retrying with `force=true` lifts the block
    pub overridable: bool,
    /// Dependent record counts by store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<BTreeMap<String, i64>>,
    pub alternatives: Vec<Alternative>,
}

/// Something the caller can do instead of the blocked operation
#[derive(Debug, Clone, Serialize)]
pub struct Alternative {
    pub action: String,
    pub description: String,
    pub endpoint: String,
}

impl Alternative {
    pub fn new(action: &str, description: &str, endpoint: String) -> Self {
        Self {
            action: action.to_string(),
            description: description.to_string(),
            endpoint,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<Blocked>,
}

impl ErrorDetail {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            blocked: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", msg.clone()),
            ),
            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new("FORBIDDEN", msg.clone()),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone())
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::Blocked(blocked) => (
                if blocked.overridable {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::CONFLICT
                },
                ErrorDetail {
                    blocked: Some((**blocked).clone()),
                    ..ErrorDetail::new(blocked.code, blocked.message.clone())
                },
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("CONFIGURATION_ERROR", format!("Configuration error: {}", msg)),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!(code = %error_detail.code, "Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

/// Turn a shared validation failure into a field error
pub fn field_error(field: &'static str) -> impl FnOnce(&'static str) -> AppError {
    move |message| AppError::validation(field, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_validation_maps_to_field_error() {
        let err: AppError = DomainError::validation("quantity", "too many").into();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "quantity"));
    }

    #[test]
    fn test_blocked_status_depends_on_override() {
        let blocked = |overridable| {
            AppError::Blocked(Box::new(Blocked {
                code: "LOT_HAS_DATA",
                message: "Lot has records".to_string(),
                overridable,
                records: None,
                alternatives: Vec::new(),
            }))
        };
        assert_eq!(blocked(true).into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(blocked(false).into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_field_error() {
        let err = Err::<(), _>("Amount cannot be negative").map_err(field_error("amount"));
        assert!(matches!(err, Err(AppError::Validation { ref field, .. }) if field == "amount"));
    }
}
