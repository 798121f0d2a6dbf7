//! Custom Axum extractors

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::error::ApiError;
use crate::models::ValidationError;

/// Header carrying the authenticated caller's user id.
pub const CALLER_HEADER: &str = "x-caller-id";

/// The caller identity taken from [`CALLER_HEADER`].
///
/// Authentication happens upstream; the header is trusted as-is.
#[derive(Debug, Clone)]
pub struct Caller(pub String);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();

        if value.is_empty() {
            return Err(ValidationError::Empty { field: "caller_id" }.into());
        }
        Ok(Self(value.to_owned()))
    }
}
