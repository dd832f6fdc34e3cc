//! API Error Handling
//!
//! Structured error responses with HTTP status codes and request tracking.

use crate::errors::BingoError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// NOT_FOUND, BAD_REQUEST, CONFLICT, ...
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    NotFound(String),
    BadRequest(String),
    /// Request is valid but clashes with the draw's current state
    Conflict(String),
    InternalError(String),
    /// Transient: nothing changed, try again
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn not_found(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::NotFound(message),
            request_id,
        }
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::BadRequest(message),
            request_id,
        }
    }

    pub fn conflict(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::Conflict(message),
            request_id,
        }
    }

    pub fn internal_error(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::InternalError(message),
            request_id,
        }
    }

    pub fn service_unavailable(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::ServiceUnavailable(message),
            request_id,
        }
    }

    /// Map an engine error to its HTTP kind
    pub fn from_engine(request_id: String, err: BingoError) -> Self {
        let message = err.to_string();
        match err {
            BingoError::NotFound { .. } => Self::not_found(request_id, message),
            BingoError::NumberOutOfRange { .. }
            | BingoError::InvalidRequest(_)
            | BingoError::InsufficientFunds { .. } => Self::bad_request(request_id, message),
            BingoError::InvalidTransition { .. }
            | BingoError::DuplicateNumber { .. }
            | BingoError::TierAlreadySettled { .. } => Self::conflict(request_id, message),
            BingoError::TransactionConflict(_) | BingoError::SettlementDeferred { .. } => {
                Self::service_unavailable(request_id, message)
            }
            BingoError::Storage(_) | BingoError::CorruptedData(_) | BingoError::Configuration(_) => {
                tracing::error!(%request_id, "Internal error: {}", message);
                Self::internal_error(request_id, message)
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::NotFound(msg) => write!(f, "[{}] Not Found: {}", self.request_id, msg),
            ApiErrorKind::BadRequest(msg) => write!(f, "[{}] Bad Request: {}", self.request_id, msg),
            ApiErrorKind::Conflict(msg) => write!(f, "[{}] Conflict: {}", self.request_id, msg),
            ApiErrorKind::InternalError(msg) => write!(f, "[{}] Internal Error: {}", self.request_id, msg),
            ApiErrorKind::ServiceUnavailable(msg) => {
                write!(f, "[{}] Service Unavailable: {}", self.request_id, msg)
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self.kind {
            ApiErrorKind::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiErrorKind::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiErrorKind::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiErrorKind::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiErrorKind::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id,
            error: ErrorBody {
                code: code.to_string(),
                message,
                details: None,
            },
        });

        (status, body).into_response()
    }
}
