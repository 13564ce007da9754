use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};

use crate::{dto::question_dto::QuestionQuery, error::Result, AppState};

#[axum::debug_handler]
pub async fn list_license_types(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.question_service.list_license_types().await?))
}

#[axum::debug_handler]
pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.question_service.list_categories().await?))
}

#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<AppState>,
    Query(query): Query<QuestionQuery>,
) -> Result<impl IntoResponse> {
    let page = state.question_service.list_questions(query).await?;
    Ok(Json(page))
}

#[axum::debug_handler]
pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let question = state.question_service.get_question(id).await?;
    Ok(Json(question))
}

#[axum::debug_handler]
pub async fn list_templates(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.question_service.list_templates().await?))
}
