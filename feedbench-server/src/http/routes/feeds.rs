//! Paginated read endpoints
//!
//! All take `limit` and `cursor` query parameters and answer with
//! `{"items": [...], "next_cursor": "..."}`; `next_cursor` is omitted once
//! the sequence is exhausted.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::http::error::ApiError;
use crate::http::extractors::Caller;
use crate::models::{Page, PageParams, PostView, UserView};
use crate::state::AppState;

/// GET /users/{user_id}/posts - one user's posts, newest first
async fn user_feed(
    State(state): State<AppState>,
    Caller(caller_id): Caller,
    Path(user_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<PostView>>, ApiError> {
    let page = state
        .service()
        .get_user_feed(&caller_id, &user_id, params)
        .await?;
    Ok(Json(page))
}

/// GET /feed - posts by everyone the caller follows
async fn followed_feed(
    State(state): State<AppState>,
    Caller(caller_id): Caller,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<PostView>>, ApiError> {
    let page = state.service().get_followed_feed(&caller_id, params).await?;
    Ok(Json(page))
}

/// GET /following - users the caller follows
async fn following(
    State(state): State<AppState>,
    Caller(caller_id): Caller,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<UserView>>, ApiError> {
    let page = state.service().get_followed(&caller_id, params).await?;
    Ok(Json(page))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{user_id}/posts", get(user_feed))
        .route("/feed", get(followed_feed))
        .route("/following", get(following))
}
