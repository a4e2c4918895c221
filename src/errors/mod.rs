//! Error handling module for the donated objects backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::ValidationErrors;

/// Message used for every validation failure envelope.
pub const INVALID_DATA_MESSAGE: &str = "Dados inválidos";
/// Message used for malformed request bodies and query strings.
pub const BAD_REQUEST_MESSAGE: &str = "Requisição inválida";
pub const NOT_FOUND_MESSAGE: &str = "Objeto não encontrado";

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// One or more schema constraints violated
    Validation(ValidationErrors),
    /// Resource not found
    NotFound(String),
    /// Identifier is not well-formed for the store
    InvalidIdentifier(String),
    /// Request body or query string could not be decoded
    BadRequest(String),
    /// Request body exceeds the configured limit
    PayloadTooLarge(String),
    /// Database error
    Database(String),
    /// Internal server error
    Internal(String),
    /// Startup configuration error
    Config(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::InvalidIdentifier(_)
            | AppError::Database(_)
            | AppError::Internal(_)
            | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Validation(errors) => errors.to_string(),
            AppError::NotFound(msg)
            | AppError::InvalidIdentifier(msg)
            | AppError::BadRequest(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::Database(msg)
            | AppError::Internal(msg)
            | AppError::Config(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::Internal(format!("JSON error: {}", err))
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

/// Failure response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorResponse {
    /// Envelope carrying only a message, used by the fallbacks.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            errors: None,
            error: None,
        }
    }

    pub fn new(error: &AppError, context: &str) -> Self {
        match error {
            AppError::Validation(errors) => Self {
                errors: Some(errors.messages()),
                ..Self::message(INVALID_DATA_MESSAGE)
            },
            AppError::NotFound(msg) => Self::message(msg.clone()),
            AppError::BadRequest(msg) | AppError::PayloadTooLarge(msg) => Self {
                error: Some(msg.clone()),
                ..Self::message(BAD_REQUEST_MESSAGE)
            },
            other => Self {
                error: Some(other.message()),
                ..Self::message(context)
            },
        }
    }
}

/// Error paired with the message describing the operation that failed.
#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub context: &'static str,
}

impl ApiError {
    pub fn new(error: AppError, context: &'static str) -> Self {
        Self { error, context }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        if status.is_server_error() {
            tracing::error!(context = self.context, error = %self.error, "request failed");
        }
        let body = ErrorResponse::new(&self.error, self.context);
        (status, Json(body)).into_response()
    }
}
