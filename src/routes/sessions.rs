use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;

use crate::{
    dto::session_dto::{
        AnswerRequest, CreateSessionRequest, HistoryQuery, NavigateRequest, SkipRequest,
    },
    error::Result,
    middleware::auth::AuthUser,
    AppState,
};

#[axum::debug_handler]
pub async fn create_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse> {
    let session = state.session_service.create(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[axum::debug_handler]
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse> {
    let history = state.session_service.list_history(user.id, query).await?;
    Ok(Json(history))
}

#[axum::debug_handler]
pub async fn get_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.session_service.stats(user.id).await?))
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.session_service.get(user.id, id).await?))
}

#[axum::debug_handler]
pub async fn answer_question(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse> {
    let response = state.session_service.answer(user.id, id, payload).await?;
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn skip_question(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SkipRequest>,
) -> Result<impl IntoResponse> {
    let response = state
        .session_service
        .skip(user.id, id, payload.question_id)
        .await?;
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn navigate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NavigateRequest>,
) -> Result<impl IntoResponse> {
    let response = state
        .session_service
        .navigate(user.id, id, payload.index)
        .await?;
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn pause(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.session_service.pause(user.id, id).await?))
}

#[axum::debug_handler]
pub async fn resume(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.session_service.resume(user.id, id).await?))
}

#[axum::debug_handler]
pub async fn abandon(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.session_service.abandon(user.id, id).await?))
}

#[axum::debug_handler]
pub async fn finish(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.session_service.finish(user.id, id).await?))
}
