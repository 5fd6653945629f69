//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod admin;
pub mod claim;
pub mod coupon;

pub use admin::AdminEntity;
pub use claim::{ClaimEntity, ClaimWithCouponEntity};
pub use coupon::{CouponEntity, CouponStatsEntity};
