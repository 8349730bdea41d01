//! Centralized error handling for the Campus Market server
//!
//! Two layers: `MarketError` is the domain taxonomy returned by the service
//! layer (order state machine, delivery codes, wallet ledger), and `ApiError`
//! maps those kinds onto HTTP responses with stable error codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Domain errors produced by the order/delivery/wallet services
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid order state: {0}")]
    InvalidState(String),

    #[error("Delivery code has expired")]
    CodeExpired,

    #[error("Could not generate a unique delivery code after {0} attempts")]
    CodeGenerationExhausted(u32),

    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: i64, required: i64 },

    #[error("Escrow gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<crate::escrow::GatewayError> for MarketError {
    fn from(err: crate::escrow::GatewayError) -> Self {
        MarketError::GatewayUnavailable(err.to_string())
    }
}

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Delivery code expired: {0}")]
    CodeExpired(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InvalidState(_) => "INVALID_STATE",
            ApiError::CodeExpired(_) => "CODE_EXPIRED",
            ApiError::InsufficientFunds(_) => "INSUFFICIENT_FUNDS",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidState(_) => StatusCode::BAD_REQUEST,
            ApiError::CodeExpired(_) => StatusCode::BAD_REQUEST,
            ApiError::InsufficientFunds(_) => StatusCode::BAD_REQUEST,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        // Log server errors
        match &self {
            ApiError::InternalError(_)
            | ApiError::DatabaseError(_)
            | ApiError::GatewayUnavailable(_) => {
                tracing::error!(error = %message, code = %error_code, "Server error occurred");
            }
            _ => {
                tracing::debug!(error = %message, code = %error_code, "Client error occurred");
            }
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        let message = err.to_string();
        match err {
            MarketError::NotFound(_) => ApiError::NotFound(message),
            MarketError::Forbidden(_) => ApiError::Forbidden(message),
            MarketError::InvalidState(_) => ApiError::InvalidState(message),
            MarketError::CodeExpired => ApiError::CodeExpired(message),
            MarketError::CodeGenerationExhausted(_) => ApiError::Conflict(message),
            MarketError::InsufficientFunds { .. } => ApiError::InsufficientFunds(message),
            MarketError::GatewayUnavailable(_) => ApiError::GatewayUnavailable(message),
            MarketError::Database(e) => ApiError::from(e),
        }
    }
}

// Convenience conversions from common error types

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            _ => ApiError::DatabaseError(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::GatewayUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid JSON: {}", err))
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for the service layer
pub type MarketResult<T> = Result<T, MarketError>;
