//! Custom Axum extractors.

pub mod admin_auth;
pub mod claimant;

pub use claimant::ClientClaimant;
