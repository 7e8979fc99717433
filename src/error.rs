// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input data. {0}")]
    Validation(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Duplicate field value: {0}. Please use another value!")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Invalid token. Please log in again!")]
    InvalidToken,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    TooManyRequests(String),

    #[error("Request body is too large")]
    PayloadTooLarge,

    #[error("{0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Full error text, attached to every error response.
///
/// Only the development-mode layer copies it into the body.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) | AppError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Upstream(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Operational errors carry a message that is safe to show to clients.
    pub fn is_operational(&self) -> bool {
        !matches!(self, AppError::Database(_) | AppError::Internal(_))
    }

    pub fn not_found_id() -> Self {
        AppError::NotFound("No document found with that ID".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if self.is_operational() {
            self.to_string()
        } else {
            match &self {
                AppError::Database(msg) => tracing::error!(error = %msg, "Database error"),
                other => tracing::error!(error = %other, "Internal server error"),
            }
            "Something went very wrong!".to_string()
        };

        if status.is_client_error() {
            tracing::debug!(%status, error = %self, "Request rejected");
        }

        let body = ErrorResponse {
            status: "error",
            message,
        };

        let mut response = (status, Json(body)).into_response();
        response
            .extensions_mut()
            .insert(ErrorDetail(self.to_string()));
        response
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
