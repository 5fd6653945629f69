//! Domain layer for the coupon dispenser.
//!
//! This crate contains:
//! - Domain models (Coupon, Claim, Admin)
//! - Store traits and an in-memory store
//! - Claim eligibility, allocation and inventory services

pub mod models;
pub mod services;
pub mod store;
