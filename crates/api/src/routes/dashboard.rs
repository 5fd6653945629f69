//! Administrator dashboard route.

use axum::{extract::State, Json};
use domain::models::DashboardStats;
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::AdminAuth;

/// GET /api/v1/admin/dashboard
///
/// Inventory counts and the most recent claims.
pub async fn get_dashboard(
    State(state): State<AppState>,
    auth: AdminAuth,
) -> Result<Json<DashboardStats>, ApiError> {
    let dashboard = state.inventory.dashboard().await?;

    info!(
        admin_id = %auth.admin_id,
        total_coupons = dashboard.stats.total_coupons,
        available_coupons = dashboard.stats.available_coupons,
        "Fetched dashboard"
    );

    Ok(Json(dashboard))
}
