use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;

use crate::{
    dto::auth_dto::{CreateProfileRequest, SelectProfileRequest},
    error::Result,
    AppState,
};

#[axum::debug_handler]
pub async fn list_profiles(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let profiles = state.auth_service.list_profiles().await?;
    Ok(Json(profiles))
}

#[axum::debug_handler]
pub async fn create_profile(
    State(state): State<AppState>,
    Json(payload): Json<CreateProfileRequest>,
) -> Result<impl IntoResponse> {
    let profile = state.auth_service.create_profile(payload).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Password-less profiles may be selected with an empty body.
#[axum::debug_handler]
pub async fn select_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<SelectProfileRequest>>,
) -> Result<impl IntoResponse> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let token = state
        .auth_service
        .select_profile(id, payload.password.as_deref())
        .await?;
    Ok(Json(token))
}
