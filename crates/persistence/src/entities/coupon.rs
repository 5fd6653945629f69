//! Coupon entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Coupon, CouponStats};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the coupons table.
#[derive(Debug, Clone, FromRow)]
pub struct CouponEntity {
    pub id: Uuid,
    pub code: String,
    pub description: String,
    pub is_active: bool,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<CouponEntity> for Coupon {
    fn from(entity: CouponEntity) -> Self {
        Self {
            id: entity.id,
            code: entity.code,
            description: entity.description,
            is_active: entity.is_active,
            is_used: entity.is_used,
            used_at: entity.used_at,
            expires_at: entity.expires_at,
            created_at: entity.created_at,
        }
    }
}

/// Aggregate counts over the coupons table.
#[derive(Debug, Clone, FromRow)]
pub struct CouponStatsEntity {
    pub total_coupons: i64,
    pub used_coupons: i64,
    pub active_coupons: i64,
    pub expired_coupons: i64,
    pub available_coupons: i64,
}

impl From<CouponStatsEntity> for CouponStats {
    fn from(entity: CouponStatsEntity) -> Self {
        Self {
            total_coupons: entity.total_coupons,
            used_coupons: entity.used_coupons,
            active_coupons: entity.active_coupons,
            expired_coupons: entity.expired_coupons,
            available_coupons: entity.available_coupons,
        }
    }
}
