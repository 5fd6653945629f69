//! Public coupon claim routes.
//!
//! Callers are anonymous; the claimant is the request's IP address plus its
//! session id.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use domain::models::{ClaimedCoupon, PublicCoupon};
use domain::services::{Availability, ClaimError, CooldownBlock, Eligibility};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::{ApiError, COOLDOWN_MESSAGE};
use crate::extractors::ClientClaimant;
use crate::middleware::metrics::{record_claim_rejected, record_coupon_claimed};

const ELIGIBLE_MESSAGE: &str = "You can claim one of these coupons";
const EMPTY_MESSAGE: &str = "No coupons available at the moment";
const CLAIMED_MESSAGE: &str = "Coupon claimed successfully";

/// Body of `GET /coupons` and `GET /eligibility`.
///
/// A blocked claimant gets `eligible: false` with the wait, not an error.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_coupons: Option<Vec<PublicCoupon>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_coupons_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_eligible_date: Option<DateTime<Utc>>,
}

impl AvailabilityResponse {
    fn blocked(block: &CooldownBlock) -> Self {
        Self {
            eligible: false,
            message: Some(COOLDOWN_MESSAGE.to_string()),
            available_coupons: None,
            available_coupons_count: None,
            time_left: Some(block.time_left_label()),
            next_eligible_date: Some(block.next_eligible_at),
        }
    }
}

/// Body of a successful claim.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimResponse {
    pub message: String,
    pub coupon: ClaimedCoupon,
}

impl From<ClaimedCoupon> for ClaimResponse {
    fn from(coupon: ClaimedCoupon) -> Self {
        Self {
            message: CLAIMED_MESSAGE.to_string(),
            coupon,
        }
    }
}

/// GET /api/v1/user/coupons
///
/// Lists the coupons the claimant may pick from, oldest first.
pub async fn list_available(
    State(state): State<AppState>,
    ClientClaimant(claimant): ClientClaimant,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let response = match state.allocator.availability(&claimant).await? {
        Availability::Blocked(block) => AvailabilityResponse::blocked(&block),
        Availability::Eligible(coupons) => AvailabilityResponse {
            eligible: true,
            message: Some(
                if coupons.is_empty() {
                    EMPTY_MESSAGE
                } else {
                    ELIGIBLE_MESSAGE
                }
                .to_string(),
            ),
            available_coupons: Some(coupons),
            available_coupons_count: None,
            time_left: None,
            next_eligible_date: None,
        },
    };

    Ok(Json(response))
}

/// GET /api/v1/user/eligibility
pub async fn check_eligibility(
    State(state): State<AppState>,
    ClientClaimant(claimant): ClientClaimant,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let response = match state.allocator.eligibility(&claimant).await? {
        Eligibility::Blocked(block) => AvailabilityResponse::blocked(&block),
        Eligibility::Eligible { available_coupons } => AvailabilityResponse {
            eligible: true,
            message: None,
            available_coupons: None,
            available_coupons_count: Some(available_coupons),
            time_left: None,
            next_eligible_date: None,
        },
    };

    Ok(Json(response))
}

/// POST /api/v1/user/claim/:coupon_id
pub async fn claim_coupon(
    State(state): State<AppState>,
    ClientClaimant(claimant): ClientClaimant,
    Path(coupon_id): Path<String>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let result = match Uuid::parse_str(&coupon_id) {
        Ok(id) => state.allocator.claim_specific(id, &claimant).await,
        // A malformed id names no coupon, but the cooldown still answers first.
        Err(_) => match state.allocator.eligibility(&claimant).await {
            Ok(Eligibility::Blocked(block)) => Err(ClaimError::RateLimited(block)),
            Ok(Eligibility::Eligible { .. }) => Err(ClaimError::NotFound),
            Err(e) => Err(e),
        },
    };

    finish_claim(result, "specific")
}

/// POST /api/v1/user/claim-next
///
/// Claims the oldest claimable coupon.
pub async fn claim_next(
    State(state): State<AppState>,
    ClientClaimant(claimant): ClientClaimant,
) -> Result<Json<ClaimResponse>, ApiError> {
    let result = state.allocator.claim_next(&claimant).await;
    finish_claim(result, "next")
}

fn finish_claim(
    result: Result<ClaimedCoupon, ClaimError>,
    mode: &'static str,
) -> Result<Json<ClaimResponse>, ApiError> {
    match result {
        Ok(coupon) => {
            record_coupon_claimed(mode);
            info!(mode, code = %coupon.code, "Coupon claimed");
            Ok(Json(coupon.into()))
        }
        Err(e) => {
            record_claim_rejected(e.reason());
            Err(e.into())
        }
    }
}
