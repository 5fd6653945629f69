//! Shared utilities for the Coupon Dispenser backend.
//!
//! This crate provides functionality used across the other crates:
//! - Admin access tokens (HS256 JWT)
//! - Password hashing with Argon2id
//! - Common validation and normalization helpers

pub mod jwt;
pub mod password;
pub mod validation;
