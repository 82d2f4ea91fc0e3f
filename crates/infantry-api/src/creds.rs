use axum::{Json, body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use uuid::Uuid;

use infantry_types::api::{
    AvailabilityResponse, ChangePasswordRequest, ChangeRoleRequest, ChangeUsernameRequest,
    CredentialResponse, LoginRequest, NewCredential, RotateTokenRequest,
};

use crate::error::EngineError;
use crate::extract::{Body, Param, required};
use crate::{AppState, optional_json, run_blocking};

pub async fn create(
    State(state): State<AppState>,
    Body(req): Body<NewCredential>,
) -> Result<impl IntoResponse, EngineError> {
    let credential = run_blocking(move || state.credentials.setup(req)).await?;
    Ok((StatusCode::CREATED, Json(CredentialResponse::issuing(credential))))
}

pub async fn login(
    State(state): State<AppState>,
    Body(req): Body<LoginRequest>,
) -> Result<Json<CredentialResponse>, EngineError> {
    let username = required(req.username, "username")?;
    let password = required(req.password, "password")?;
    let credential =
        run_blocking(move || state.credentials.login(&username, &password)).await?;
    Ok(Json(CredentialResponse::issuing(credential)))
}

pub async fn availability(
    State(state): State<AppState>,
    Param(username): Param<String>,
) -> Result<Json<AvailabilityResponse>, EngineError> {
    let name = username.clone();
    let available = run_blocking(move || state.credentials.is_username_available(&name)).await?;
    Ok(Json(AvailabilityResponse {
        username,
        available,
    }))
}

pub async fn get(
    State(state): State<AppState>,
    Param(user_id): Param<Uuid>,
) -> Result<Json<CredentialResponse>, EngineError> {
    let credential = run_blocking(move || state.credentials.get(user_id)).await?;
    Ok(Json(CredentialResponse::public(credential)))
}

pub async fn change_username(
    State(state): State<AppState>,
    Param(user_id): Param<Uuid>,
    Body(req): Body<ChangeUsernameRequest>,
) -> Result<Json<CredentialResponse>, EngineError> {
    let username = required(req.username, "username")?;
    let credential =
        run_blocking(move || state.credentials.change_username(user_id, &username)).await?;
    Ok(Json(CredentialResponse::public(credential)))
}

pub async fn change_password(
    State(state): State<AppState>,
    Param(user_id): Param<Uuid>,
    Body(req): Body<ChangePasswordRequest>,
) -> Result<Json<CredentialResponse>, EngineError> {
    let password = required(req.password, "password")?;
    let credential = run_blocking(move || {
        state
            .credentials
            .change_password(user_id, &password, req.require_change)
    })
    .await?;
    Ok(Json(CredentialResponse::public(credential)))
}

pub async fn change_role(
    State(state): State<AppState>,
    Param(user_id): Param<Uuid>,
    Body(req): Body<ChangeRoleRequest>,
) -> Result<Json<CredentialResponse>, EngineError> {
    let role = required(req.role, "role")?;
    let credential =
        run_blocking(move || state.credentials.change_role_named(user_id, &role)).await?;
    Ok(Json(CredentialResponse::public(credential)))
}

pub async fn toggle_active(
    State(state): State<AppState>,
    Param(user_id): Param<Uuid>,
) -> Result<Json<CredentialResponse>, EngineError> {
    let credential = run_blocking(move || state.credentials.toggle_active(user_id)).await?;
    Ok(Json(CredentialResponse::public(credential)))
}

/// Body is optional: `{ "revoke": "<token>" }` drops that token first. The
/// response carries the new token.
pub async fn rotate_token(
    State(state): State<AppState>,
    Param(user_id): Param<Uuid>,
    body: Bytes,
) -> Result<Json<CredentialResponse>, EngineError> {
    let req: RotateTokenRequest = optional_json(&body)?.unwrap_or_default();
    let credential = run_blocking(move || {
        state
            .credentials
            .rotate_token(user_id, req.revoke.as_deref())
    })
    .await?;
    Ok(Json(CredentialResponse::issuing(credential)))
}
