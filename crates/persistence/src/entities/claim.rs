//! Claim entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{Claim, ClaimCouponInfo, ClaimRecord};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the claims table.
#[derive(Debug, Clone, FromRow)]
pub struct ClaimEntity {
    pub id: Uuid,
    pub coupon_id: Uuid,
    pub ip_address: String,
    pub session_id: String,
    pub user_agent: Option<String>,
    pub claimed_at: DateTime<Utc>,
}

impl From<ClaimEntity> for Claim {
    fn from(entity: ClaimEntity) -> Self {
        Self {
            id: entity.id,
            coupon_id: entity.coupon_id,
            ip_address: entity.ip_address,
            session_id: entity.session_id,
            user_agent: entity.user_agent,
            claimed_at: entity.claimed_at,
        }
    }
}

/// Claim joined with its coupon for history views.
#[derive(Debug, Clone, FromRow)]
pub struct ClaimWithCouponEntity {
    pub id: Uuid,
    pub coupon_id: Uuid,
    pub ip_address: String,
    pub session_id: String,
    pub user_agent: Option<String>,
    pub claimed_at: DateTime<Utc>,
    // Coupon info (LEFT JOIN)
    pub coupon_code: Option<String>,
    pub coupon_description: Option<String>,
}

impl From<ClaimWithCouponEntity> for ClaimRecord {
    fn from(entity: ClaimWithCouponEntity) -> Self {
        let coupon = match (entity.coupon_code, entity.coupon_description) {
            (Some(code), Some(description)) => Some(ClaimCouponInfo {
                id: entity.coupon_id,
                code,
                description,
            }),
            _ => None,
        };

        Self {
            id: entity.id,
            coupon,
            ip_address: entity.ip_address,
            session_id: entity.session_id,
            user_agent: entity.user_agent,
            claimed_at: entity.claimed_at,
        }
    }
}
