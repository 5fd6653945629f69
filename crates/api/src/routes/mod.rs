//! HTTP route handlers.

pub mod admin_auth;
pub mod admin_claims;
pub mod admin_coupons;
pub mod claims;
pub mod dashboard;
pub mod health;
