//! API error handling
//!
//! Structured error responses with proper HTTP status codes and request
//! tracking.

use crate::errors::EngineError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

/// Error body with structured information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code (BAD_REQUEST, CONFLICT, SERVICE_UNAVAILABLE, ...)
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    BadRequest(String),
    /// Operation conflicts with the wager's or round's current state
    Conflict(String),
    NotFound(String),
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::BadRequest(message.into()),
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::NotFound(message.into()),
            request_id: Uuid::new_v4().to_string(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let kind = match &err {
            EngineError::InvalidStake => ApiErrorKind::BadRequest(err.to_string()),
            EngineError::NotCancellable
            | EngineError::AlreadySettled
            | EngineError::NotActive
            | EngineError::InsufficientFunds => ApiErrorKind::Conflict(err.to_string()),
            EngineError::LedgerUnavailable(_) => ApiErrorKind::ServiceUnavailable(err.to_string()),
        };
        Self {
            kind,
            request_id: Uuid::new_v4().to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::BadRequest(msg) => {
                write!(f, "[{}] Bad Request: {}", self.request_id, msg)
            }
            ApiErrorKind::Conflict(msg) => write!(f, "[{}] Conflict: {}", self.request_id, msg),
            ApiErrorKind::NotFound(msg) => write!(f, "[{}] Not Found: {}", self.request_id, msg),
            ApiErrorKind::ServiceUnavailable(msg) => {
                write!(f, "[{}] Service Unavailable: {}", self.request_id, msg)
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.kind {
            ApiErrorKind::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiErrorKind::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiErrorKind::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiErrorKind::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
            ),
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id.clone(),
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}
