/// Unified error types for the Unibro backend
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Main error type for the backend
#[derive(Error, Debug)]
pub enum AppError {
    /// Entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate unique key (e.g., email)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Wrong password, unknown account, or password login on an OAuth-only account
    #[error("Invalid credentials: {message}")]
    InvalidCredential {
        message: String,
        remaining_attempts: Option<u32>,
    },

    /// Lockout active
    #[error("Account locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    /// Missing, wrong and expired tokens all look the same to the caller
    #[error("Invalid or expired token")]
    TokenInvalidOrExpired,

    /// Resend cooldown or daily cap
    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after: DateTime<Utc>,
        wait_seconds: i64,
    },

    /// Action attempted on an entity in the wrong lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Actor lacks role or ownership
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or invalid session token
    #[error("Authentication required: {0}")]
    Authentication(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Object storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Stable kind tags surfaced to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidCredential,
    AccountLocked,
    TokenInvalidOrExpired,
    RateLimited,
    InvalidState,
    Unauthorized,
    ValidationError,
    Authentication,
    Internal,
}

impl AppError {
    pub fn invalid_credential(message: impl Into<String>) -> Self {
        AppError::InvalidCredential {
            message: message.into(),
            remaining_attempts: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            AppError::InvalidCredential { .. } => ErrorKind::InvalidCredential,
            AppError::AccountLocked { .. } => ErrorKind::AccountLocked,
            AppError::TokenInvalidOrExpired => ErrorKind::TokenInvalidOrExpired,
            AppError::RateLimited { .. } => ErrorKind::RateLimited,
            AppError::InvalidState(_) => ErrorKind::InvalidState,
            AppError::Unauthorized(_) => ErrorKind::Unauthorized,
            AppError::Validation(_) => ErrorKind::ValidationError,
            AppError::Authentication(_) => ErrorKind::Authentication,
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Io(_)
            | AppError::Storage(_)
            | AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::AlreadyExists => StatusCode::CONFLICT,
            ErrorKind::InvalidCredential => StatusCode::UNAUTHORIZED,
            ErrorKind::AccountLocked => StatusCode::LOCKED,
            ErrorKind::TokenInvalidOrExpired => StatusCode::BAD_REQUEST,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::InvalidState => StatusCode::CONFLICT,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human readable message safe to show to clients
    pub fn public_message(&self) -> String {
        match self {
            AppError::InvalidCredential { message, .. } => message.clone(),
            AppError::AccountLocked { until } => format!(
                "Account is temporarily locked. Please try again after {}",
                until.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            AppError::RateLimited { message, .. } => message.clone(),
            AppError::NotFound(message)
            | AppError::AlreadyExists(message)
            | AppError::InvalidState(message)
            | AppError::Unauthorized(message)
            | AppError::Validation(message)
            | AppError::Authentication(message) => message.clone(),
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Io(_)
            | AppError::Storage(_)
            | AppError::Internal(_) => "Internal server error".to_string(), // Don't leak details
            other => other.to_string(),
        }
    }
}

/// Failure envelope
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub ok: bool,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_attempts: Option<u32>,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        let mut body = ErrorResponse {
            ok: false,
            kind: err.kind(),
            message: err.public_message(),
            locked_until: None,
            retry_after: None,
            wait_seconds: None,
            remaining_attempts: None,
        };

        match err {
            AppError::AccountLocked { until } => {
                body.locked_until = Some(*until);
                body.remaining_attempts = Some(0);
            }
            AppError::RateLimited {
                retry_after,
                wait_seconds,
                ..
            } => {
                body.retry_after = Some(*retry_after);
                body.wait_seconds = Some(*wait_seconds);
            }
            AppError::InvalidCredential {
                remaining_attempts, ..
            } => body.remaining_attempts = *remaining_attempts,
            _ => {}
        }

        body
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.kind() == ErrorKind::Internal {
            tracing::error!(error = %self, "Request failed with internal error");
        }

        let status = self.status();
        let body = ErrorResponse::from(&self);

        let mut response = (status, Json(body)).into_response();
        if let AppError::RateLimited { wait_seconds, .. } = &self {
            if let Ok(value) = (*wait_seconds).max(0).to_string().parse() {
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for backend operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_internal_errors_do_not_leak() {
        let err = AppError::Internal("db password is hunter2".to_string());
        let body = ErrorResponse::from(&err);
        assert_eq!(body.kind, ErrorKind::Internal);
        assert_eq!(body.message, "Internal server error");

        let body = ErrorResponse::from(&AppError::Storage("disk full".to_string()));
        assert_eq!(body.message, "Internal server error");
    }

    #[test]
    fn test_client_errors_carry_their_message() {
        let body = ErrorResponse::from(&AppError::NotFound("User not found".to_string()));
        assert_eq!(body.message, "User not found");
        assert!(!body.ok);

        let body = ErrorResponse::from(&AppError::TokenInvalidOrExpired);
        assert_eq!(body.message, "Invalid or expired token");
    }

    #[test]
    fn test_locked_response_carries_unlock_time() {
        let until = Utc::now() + Duration::hours(2);
        let err = AppError::AccountLocked { until };
        let body = ErrorResponse::from(&err);

        assert_eq!(err.status(), StatusCode::LOCKED);
        assert_eq!(body.locked_until, Some(until));
        assert_eq!(body.remaining_attempts, Some(0));
    }

    #[test]
    fn test_rate_limited_response() {
        let retry_after = Utc::now() + Duration::seconds(30);
        let err = AppError::RateLimited {
            message: "slow down".to_string(),
            retry_after,
            wait_seconds: 30,
        };

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(axum::http::header::RETRY_AFTER).unwrap(),
            "30"
        );
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(AppError::TokenInvalidOrExpired.kind(), ErrorKind::TokenInvalidOrExpired);
        assert_eq!(
            AppError::Validation("x".into()).kind(),
            ErrorKind::ValidationError
        );
        assert_eq!(
            AppError::InvalidState("x".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Unauthorized("x".into()).status(),
            StatusCode::FORBIDDEN
        );
    }
}
