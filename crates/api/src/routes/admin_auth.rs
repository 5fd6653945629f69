//! Administrator account routes.

use axum::{extract::State, http::StatusCode, Json};
use domain::models::admin::{LoginRequest, RegisterAdminRequest};
use domain::models::AdminProfile;
use tracing::debug;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::AdminAuth;
use crate::services::auth::AuthResponse;

/// POST /api/v1/admin/register
///
/// Only available while `admin.allow_registration` is on.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterAdminRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    request.validate()?;

    let response = state.auth.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/admin/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    request.validate()?;

    let response = state.auth.login(request).await?;
    Ok(Json(response))
}

/// GET /api/v1/admin/profile
pub async fn profile(
    State(state): State<AppState>,
    auth: AdminAuth,
) -> Result<Json<AdminProfile>, ApiError> {
    debug!(admin_id = %auth.admin_id, jti = %auth.jti, "Profile requested");
    let profile = state.auth.profile(auth.admin_id).await?;
    Ok(Json(profile))
}
