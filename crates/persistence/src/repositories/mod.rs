//! Repository implementations of the domain store traits.

pub mod admin;
pub mod claim;
pub mod coupon;

pub use admin::AdminRepository;
pub use claim::ClaimRepository;
pub use coupon::CouponRepository;
