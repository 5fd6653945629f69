//! Administrator coupon inventory routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::coupon::{BulkCreateCouponsRequest, CreateCouponRequest, UpdateCouponRequest};
use domain::models::{Coupon, NewCoupon};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::record_coupons_created;
use crate::middleware::AdminAuth;

/// Response body for a bulk create.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateResponse {
    pub message: String,
    pub count: usize,
    pub coupons: Vec<Coupon>,
}

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Malformed ids cannot name a coupon.
fn parse_coupon_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::NotFound("Coupon not found".to_string()))
}

/// GET /api/v1/admin/coupons
///
/// Every coupon, newest first.
pub async fn list_coupons(State(state): State<AppState>) -> Result<Json<Vec<Coupon>>, ApiError> {
    Ok(Json(state.inventory.list_all().await?))
}

/// GET /api/v1/admin/coupons/:id
pub async fn get_coupon(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Coupon>, ApiError> {
    let id = parse_coupon_id(&id)?;
    Ok(Json(state.inventory.get(id).await?))
}

/// POST /api/v1/admin/coupons
pub async fn create_coupon(
    State(state): State<AppState>,
    auth: AdminAuth,
    Json(request): Json<CreateCouponRequest>,
) -> Result<(StatusCode, Json<Coupon>), ApiError> {
    request.validate()?;

    let coupon = state.inventory.create(request.into()).await?;
    record_coupons_created(1);
    info!(admin_id = %auth.admin_id, coupon_id = %coupon.id, "Admin created coupon");

    Ok((StatusCode::CREATED, Json(coupon)))
}

/// POST /api/v1/admin/coupons/bulk
///
/// All or nothing: one bad or duplicate code rejects the whole batch.
pub async fn create_coupons_bulk(
    State(state): State<AppState>,
    auth: AdminAuth,
    Json(request): Json<BulkCreateCouponsRequest>,
) -> Result<(StatusCode, Json<BulkCreateResponse>), ApiError> {
    let max = state.config.limits.max_bulk_coupons;
    if request.coupons.len() > max {
        return Err(ApiError::Validation(format!(
            "Batch of {} coupons exceeds the limit of {}",
            request.coupons.len(),
            max
        )));
    }
    request.validate()?;

    let batch: Vec<NewCoupon> = request.coupons.into_iter().map(Into::into).collect();
    let coupons = state.inventory.create_bulk(batch).await?;
    record_coupons_created(coupons.len());
    info!(admin_id = %auth.admin_id, count = coupons.len(), "Admin created coupons in bulk");

    Ok((
        StatusCode::CREATED,
        Json(BulkCreateResponse {
            message: format!("{} coupons created successfully", coupons.len()),
            count: coupons.len(),
            coupons,
        }),
    ))
}

/// PUT /api/v1/admin/coupons/:id
///
/// Used coupons accept description and expiry changes only.
pub async fn update_coupon(
    State(state): State<AppState>,
    auth: AdminAuth,
    Path(id): Path<String>,
    Json(request): Json<UpdateCouponRequest>,
) -> Result<Json<Coupon>, ApiError> {
    let id = parse_coupon_id(&id)?;
    request.validate()?;

    let coupon = state.inventory.update(id, request.into()).await?;
    info!(admin_id = %auth.admin_id, coupon_id = %id, "Admin updated coupon");

    Ok(Json(coupon))
}

/// DELETE /api/v1/admin/coupons/:id
pub async fn delete_coupon(
    State(state): State<AppState>,
    auth: AdminAuth,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_coupon_id(&id)?;

    state.inventory.delete(id).await?;
    info!(admin_id = %auth.admin_id, coupon_id = %id, "Admin deleted coupon");

    Ok(Json(MessageResponse {
        message: "Coupon deleted successfully".to_string(),
    }))
}

/// PATCH /api/v1/admin/coupons/:id/toggle
pub async fn toggle_coupon(
    State(state): State<AppState>,
    auth: AdminAuth,
    Path(id): Path<String>,
) -> Result<Json<Coupon>, ApiError> {
    let id = parse_coupon_id(&id)?;

    let coupon = state.inventory.toggle(id).await?;
    info!(
        admin_id = %auth.admin_id,
        coupon_id = %id,
        is_active = coupon.is_active,
        "Admin toggled coupon"
    );

    Ok(Json(coupon))
}
