//! Claim history routes.

use axum::{
    extract::{Query, State},
    Json,
};
use domain::models::ClaimRecord;
use serde::Deserialize;
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::AdminAuth;

/// Query parameters for claim history.
#[derive(Debug, Default, Deserialize)]
pub struct ClaimHistoryQuery {
    pub limit: Option<i64>,
}

impl ClaimHistoryQuery {
    /// Requested limit clamped to `1..=max`. No limit means `max`.
    pub fn effective_limit(&self, max: i64) -> i64 {
        self.limit.unwrap_or(max).clamp(1, max.max(1))
    }
}

/// GET /api/v1/admin/claims?limit=N
///
/// Newest claims first, each with its coupon.
pub async fn list_claims(
    State(state): State<AppState>,
    auth: AdminAuth,
    Query(query): Query<ClaimHistoryQuery>,
) -> Result<Json<Vec<ClaimRecord>>, ApiError> {
    let limit = query.effective_limit(state.config.limits.max_claim_history);
    let claims = state.inventory.claim_history(Some(limit)).await?;

    info!(
        admin_id = %auth.admin_id,
        limit,
        returned = claims.len(),
        "Fetched claim history"
    );

    Ok(Json(claims))
}
