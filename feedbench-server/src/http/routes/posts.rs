//! Post endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::http::error::ApiError;
use crate::http::extractors::Caller;
use crate::models::PostView;
use crate::state::AppState;

/// Create post request
#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
}

/// POST /posts - publish a post owned by the caller
async fn create_post(
    State(state): State<AppState>,
    Caller(caller_id): Caller,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostView>), ApiError> {
    let post = state.service().create_post(&caller_id, &req.content).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /posts/{post_id}
async fn get_post(
    State(state): State<AppState>,
    Caller(caller_id): Caller,
    Path(post_id): Path<String>,
) -> Result<Json<PostView>, ApiError> {
    state
        .service()
        .get_post(&caller_id, &post_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("post", post_id))
}

/// POST /posts/{post_id}/like - returns the post with its updated like count
async fn like_post(
    State(state): State<AppState>,
    Caller(caller_id): Caller,
    Path(post_id): Path<String>,
) -> Result<Json<PostView>, ApiError> {
    let post = state.service().like_post(&caller_id, &post_id).await?;
    Ok(Json(post))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route("/posts/{post_id}", get(get_post))
        .route("/posts/{post_id}/like", post(like_post))
}
