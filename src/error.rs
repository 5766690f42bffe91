//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::pagination::PaginationError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Missing or invalid actor identity")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Pagination(#[from] PaginationError),

    // Server errors (5xx)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Coarse classification used by callers and the HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthenticated,
    Forbidden,
    ServiceUnavailable,
    DataCorruption,
    Internal,
}

impl AppError {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("{what} {id}"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) | AppError::Pagination(_) => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Unauthenticated => ErrorKind::Unauthenticated,
            AppError::Forbidden(_) => ErrorKind::Forbidden,
            AppError::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            AppError::Domain(err) => match err {
                DomainError::Forbidden(_) => ErrorKind::Forbidden,
                DomainError::UnitPriceUnavailable => ErrorKind::ServiceUnavailable,
                DomainError::CorruptStatus { .. } => ErrorKind::DataCorruption,
                e if e.is_conflict_error() => ErrorKind::Conflict,
                e if e.is_client_error() => ErrorKind::Validation,
                _ => ErrorKind::Internal,
            },
            AppError::Store(_) | AppError::Internal(_) | AppError::Config(_) => ErrorKind::Internal,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match self.kind() {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, "validation_error", None),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found", None),
            ErrorKind::Conflict => (StatusCode::CONFLICT, "conflict", None),
            ErrorKind::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated", None),
            ErrorKind::Forbidden => (StatusCode::FORBIDDEN, "forbidden", None),
            ErrorKind::ServiceUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", None)
            }
            ErrorKind::DataCorruption => {
                tracing::error!("Data corruption: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "data_corruption", None)
            }
            ErrorKind::Internal => {
                let code = match &self {
                    AppError::Store(e) => {
                        tracing::error!("Store error: {:?}", e);
                        "database_error"
                    }
                    AppError::Config(e) => {
                        tracing::error!("Config error: {:?}", e);
                        "config_error"
                    }
                    other => {
                        tracing::error!("Internal error: {}", other);
                        "internal_error"
                    }
                };
                (StatusCode::INTERNAL_SERVER_ERROR, code, None)
            }
        };

        // never echo storage details to clients
        let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
