//! Persistence layer for the coupon dispenser.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain store traits
//! - SQL migrations (`src/migrations`)

pub mod db;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod repositories;

use std::sync::Arc;

use domain::store::Stores;
use sqlx::PgPool;

use repositories::{AdminRepository, ClaimRepository, CouponRepository};

/// Builds the PostgreSQL-backed store set.
pub fn postgres_stores(pool: PgPool) -> Stores {
    Stores {
        coupons: Arc::new(CouponRepository::new(pool.clone())),
        claims: Arc::new(ClaimRepository::new(pool.clone())),
        admins: Arc::new(AdminRepository::new(pool)),
    }
}
