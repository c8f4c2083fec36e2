//! REST API module for HTTP endpoints
//!
//! Ops endpoints over the tiered store:
//! - `GET /api/cold/status` - Feature status
//! - `GET /api/cold/:service_id/summary` - Archived range and segments
//! - `GET /api/cold/:service_id/progress` - Export watermark and version
//! - `POST /api/cold/:service_id/export` - Run one export cycle now
//! - `GET /api/events` - Hybrid serialized read

pub mod cold;
pub mod events;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;

use crate::cold::ColdError;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Total count (for list responses)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data, total: None }
    }

    pub fn with_total(data: T, total: usize) -> Self {
        Self {
            data,
            total: Some(total),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    fn with_code(message: impl Into<String>, code: &str) -> Self {
        Self {
            error: message.into(),
            code: code.to_string(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_code(message, "NOT_FOUND")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_code(message, "BAD_REQUEST")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_code(message, "CONFLICT")
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::with_code(message, "UNAVAILABLE")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_code(message, "INTERNAL_ERROR")
    }

    /// Map a cold tier failure onto an HTTP status and error body
    pub fn from_cold(error: &ColdError) -> (StatusCode, Self) {
        let message = error.to_string();
        match error {
            ColdError::NotFound { .. } => (StatusCode::NOT_FOUND, Self::not_found(message)),
            ColdError::Disabled => (StatusCode::CONFLICT, Self::with_code(message, "DISABLED")),
            ColdError::LeaseContended { .. }
            | ColdError::LeaseNotHeld { .. }
            | ColdError::PreconditionFailed { .. }
            | ColdError::ManifestConflict { .. } => (StatusCode::CONFLICT, Self::conflict(message)),
            ColdError::Corruption { .. } | ColdError::CorruptSegment { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Self::with_code(message, "CORRUPTED"),
            ),
            ColdError::InvalidSortableId(_) => (StatusCode::BAD_REQUEST, Self::bad_request(message)),
            ColdError::NotSupported(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Self::with_code(message, "NOT_SUPPORTED"),
            ),
            ColdError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, Self::unavailable(message)),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, Self::internal(message)),
        }
    }
}

/// Error body plus status, usable as a handler's `Err` type
pub struct ApiFailure(pub StatusCode, pub ApiError);

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

impl From<ColdError> for ApiFailure {
    fn from(error: ColdError) -> Self {
        let (status, body) = ApiError::from_cold(&error);
        ApiFailure(status, body)
    }
}

/// Service IDs become object key segments; reject anything path-like
pub fn validate_service_id(service_id: &str) -> Result<(), ApiFailure> {
    let valid = !service_id.is_empty()
        && service_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && service_id != "."
        && service_id != "..";
    if valid {
        Ok(())
    } else {
        Err(ApiFailure(
            StatusCode::BAD_REQUEST,
            ApiError::bad_request(format!("invalid service id: '{}'", service_id)),
        ))
    }
}
