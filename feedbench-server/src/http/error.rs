//! API error type with IntoResponse
//!
//! Errors are converted to JSON bodies `{"error": <kind>, "message": ...}`
//! with a status derived from the error kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::{ErrorKind, FeedError};
use crate::models::ValidationError;

#[derive(Debug)]
pub enum ApiError {
    /// Operation failure (status from its kind)
    Feed(FeedError),

    /// Single entity lookup came back empty (404)
    NotFound { resource: &'static str, id: String },
}

impl ApiError {
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "not_found",
                    "message": format!("{} '{}' not found", resource, id)
                }),
            ),
            Self::Feed(e) => {
                let kind = e.kind();
                let message = match kind {
                    ErrorKind::Internal => {
                        // Log the actual error, return generic message
                        tracing::error!("internal error: {}", e);
                        "an internal error occurred".to_string()
                    }
                    ErrorKind::Unavailable => {
                        tracing::warn!("store unavailable: {}", e);
                        "the store is temporarily unavailable".to_string()
                    }
                    _ => e.to_string(),
                };
                (
                    status_for(kind),
                    json!({
                        "error": kind.as_str(),
                        "message": message
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<FeedError> for ApiError {
    fn from(e: FeedError) -> Self {
        Self::Feed(e)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Feed(FeedError::InvalidArgument(e))
    }
}
