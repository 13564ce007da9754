use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::json;

use crate::{
    dto::progress_dto::BookmarkRequest, error::Result, middleware::auth::AuthUser, AppState,
};

#[axum::debug_handler]
pub async fn get_overview(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.progress_service.overview(user.id).await?))
}

#[axum::debug_handler]
pub async fn list_bookmarks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.progress_service.list_bookmarks(user.id).await?))
}

/// An empty body toggles the bookmark.
#[axum::debug_handler]
pub async fn set_bookmark(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(question_id): Path<i64>,
    payload: Option<Json<BookmarkRequest>>,
) -> Result<impl IntoResponse> {
    let bookmarked = payload.and_then(|Json(p)| p.bookmarked);
    let response = state
        .progress_service
        .set_bookmark(user.id, question_id, bookmarked)
        .await?;
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn reset_progress(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let removed = state.progress_service.reset(user.id).await?;
    Ok(Json(json!({ "reset": true, "removed": removed })))
}
