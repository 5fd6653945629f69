//! Domain models for the coupon dispenser.

pub mod admin;
pub mod claim;
pub mod coupon;
pub mod dashboard;

pub use admin::{Admin, AdminProfile, NewAdmin};
pub use claim::{Claim, ClaimCouponInfo, ClaimRecord, Claimant, NewClaim};
pub use coupon::{ClaimedCoupon, Coupon, CouponChanges, Ineligibility, NewCoupon, PublicCoupon};
pub use dashboard::{CouponStats, DashboardStats};
