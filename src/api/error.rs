//! API error types with structured JSON responses.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::advisor::AdvisorError;
use crate::db::DatabaseError;
use crate::reminders::ReminderError;
use crate::sos::SosError;

/// Error body: `{ success: false, code, message, error? }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// `message` is shown to the client; `detail` is only logged.
    #[error("Internal error: {message}: {detail}")]
    Internal { message: String, detail: String },
    /// An external provider failed or is not configured.
    #[error("Upstream error: {message}: {detail}")]
    Upstream { message: String, detail: String },
}

impl ApiError {
    pub fn internal(message: &str, detail: impl std::fmt::Display) -> Self {
        ApiError::Internal {
            message: message.to_string(),
            detail: detail.to_string(),
        }
    }

    /// Map an advisor failure, using `message` for provider errors.
    pub fn from_advisor(message: &str, err: AdvisorError) -> Self {
        match err {
            AdvisorError::NoPagesExtracted => ApiError::internal(&err.to_string(), &err),
            other => ApiError::Upstream {
                message: message.to_string(),
                detail: other.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, error) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail, None),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail, None),
            ApiError::Internal { message, detail } => {
                tracing::error!(detail, "API internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message, None)
            }
            ApiError::Upstream { message, detail } => {
                tracing::warn!(detail, "Upstream provider error");
                (StatusCode::BAD_GATEWAY, "UPSTREAM", message, Some(detail))
            }
        };

        let body = ErrorBody {
            success: false,
            code,
            message,
            error,
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(format!("Invalid multipart body: {}", rejection.body_text()))
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::internal("A database error occurred", err)
    }
}

impl From<ReminderError> for ApiError {
    fn from(err: ReminderError) -> Self {
        match err {
            ReminderError::Validation(message) => ApiError::BadRequest(message),
            ReminderError::NotFound(_) => ApiError::NotFound("Reminder not found".into()),
            ReminderError::Database(e) => e.into(),
        }
    }
}

impl From<SosError> for ApiError {
    fn from(err: SosError) -> Self {
        match err {
            SosError::InvalidCoordinates => ApiError::BadRequest(err.to_string()),
            SosError::ProfileNotFound => ApiError::NotFound(err.to_string()),
            SosError::Database(e) => ApiError::internal("Error sending SOS alert", e),
        }
    }
}
