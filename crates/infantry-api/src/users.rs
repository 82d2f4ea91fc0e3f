use axum::{Json, body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use uuid::Uuid;

use infantry_types::api::{AddPhotoRequest, OptionsRequest, ProfilePatch};
use infantry_types::models::User;

use crate::error::EngineError;
use crate::extract::{Body, Param};
use crate::{AppState, optional_json, run_blocking};

pub async fn create(
    State(state): State<AppState>,
    Body(patch): Body<ProfilePatch>,
) -> Result<impl IntoResponse, EngineError> {
    let user = run_blocking(move || state.profiles.setup(patch)).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get(
    State(state): State<AppState>,
    Param(id): Param<Uuid>,
) -> Result<Json<User>, EngineError> {
    Ok(Json(run_blocking(move || state.profiles.get(id)).await?))
}

/// An empty body leaves the profile untouched.
pub async fn update(
    State(state): State<AppState>,
    Param(id): Param<Uuid>,
    body: Bytes,
) -> Result<Json<User>, EngineError> {
    let patch: Option<ProfilePatch> = optional_json(&body)?;
    Ok(Json(run_blocking(move || state.profiles.update(id, patch)).await?))
}

pub async fn add_photo(
    State(state): State<AppState>,
    Param(id): Param<Uuid>,
    Body(req): Body<AddPhotoRequest>,
) -> Result<Json<User>, EngineError> {
    // Absent and blank URLs are both rejected by the engine.
    let original_url = req.original_url.unwrap_or_default();
    let user =
        run_blocking(move || state.profiles.add_photo(id, &original_url, req.sizes)).await?;
    Ok(Json(user))
}

pub async fn add_options(
    State(state): State<AppState>,
    Param(id): Param<Uuid>,
    Body(req): Body<OptionsRequest>,
) -> Result<Json<User>, EngineError> {
    Ok(Json(run_blocking(move || state.profiles.add_options(id, req.options)).await?))
}

pub async fn remove_options(
    State(state): State<AppState>,
    Param(id): Param<Uuid>,
    Body(req): Body<OptionsRequest>,
) -> Result<Json<User>, EngineError> {
    Ok(Json(run_blocking(move || state.profiles.remove_options(id, req.options)).await?))
}
