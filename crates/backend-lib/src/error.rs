// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::auth::CredentialError;
use crate::validation::ValidationError;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Record {0} was modified concurrently")]
    StaleRecord(uuid::Uuid),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Stored credential is malformed for account {0}")]
    MalformedCredential(uuid::Uuid),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) | AppError::StaleRecord(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidPassword => StatusCode::UNAUTHORIZED,
            AppError::MalformedCredential(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Credential(CredentialError::EmptySecret) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VAL_001",
            AppError::InvalidInput(_) => "VAL_002",
            AppError::Conflict(_) => "CONFLICT_001",
            AppError::StaleRecord(_) => "CONFLICT_002",
            AppError::NotFound(_) => "NF_001",
            AppError::InvalidPassword => "AUTH_002",
            AppError::MalformedCredential(_) => "CRED_001",
            AppError::Credential(_) => "CRED_002",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            // validation and conflict messages describe the request, not the server
            AppError::Validation(e) => e.to_string(),
            AppError::InvalidInput(_) => "Invalid input provided".to_string(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::StaleRecord(_) => {
                "The account was modified concurrently, please retry".to_string()
            },
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::InvalidPassword => "Authentication failed".to_string(),
            AppError::MalformedCredential(_) => {
                "Stored password is unusable, a password reset is required".to_string()
            },
            AppError::Credential(CredentialError::EmptySecret) => {
                "Password must not be empty".to_string()
            },
            AppError::Credential(_) | AppError::Internal(_) => {
                "An internal server error occurred".to_string()
            },
            AppError::Io(_) => "Internal server error".to_string(),
            AppError::Json(_) => "Invalid request format".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("blocking task failed: {err}"))
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
