//! User endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::http::error::ApiError;
use crate::http::extractors::Caller;
use crate::models::{User, UserView};
use crate::state::AppState;

/// Create user request
#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub user_name: String,
    pub role: String,
}

/// POST /users - register a user
async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state
        .service()
        .create_user(&req.user_name, &req.role)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users/{user_id} - a user as seen by the caller
async fn get_user(
    State(state): State<AppState>,
    Caller(caller_id): Caller,
    Path(user_id): Path<String>,
) -> Result<Json<UserView>, ApiError> {
    state
        .service()
        .get_user(&caller_id, &user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("user", user_id))
}

/// POST /users/{user_id}/follow - caller follows the user
async fn follow_user(
    State(state): State<AppState>,
    Caller(caller_id): Caller,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service().follow_user(&caller_id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/{user_id}", get(get_user))
        .route("/users/{user_id}/follow", post(follow_user))
}
