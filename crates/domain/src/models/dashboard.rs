//! Dashboard statistics models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::claim::ClaimRecord;

/// Inventory counts at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponStats {
    pub total_coupons: i64,
    pub used_coupons: i64,
    /// Active and unused.
    pub active_coupons: i64,
    /// Expired and unused.
    pub expired_coupons: i64,
    /// Active, unused and unexpired. Equals the claimable count.
    pub available_coupons: i64,
}

/// Administrator dashboard payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub stats: CouponStats,
    pub recent_claims: Vec<ClaimRecord>,
    pub generated_at: DateTime<Utc>,
}
