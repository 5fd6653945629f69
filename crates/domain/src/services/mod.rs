//! Domain services for the coupon dispenser.
//!
//! Services contain business logic that operates on domain models through
//! the store traits.

pub mod allocator;
pub mod cooldown;
pub mod inventory;

pub use allocator::{Availability, ClaimError, ClaimPolicy, CouponAllocator, Eligibility};
pub use cooldown::{CooldownBlock, CooldownChecker, CooldownStatus};
pub use inventory::{CouponInventory, InventoryError};
