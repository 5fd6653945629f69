//! Storage abstractions for coupons, claims and administrators.
//!
//! Services only talk to these traits. The `persistence` crate implements
//! them on PostgreSQL; [`memory::InMemoryStore`] implements them in process.

pub mod memory;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Admin, Claim, ClaimRecord, Claimant, Coupon, CouponChanges, CouponStats, NewAdmin, NewClaim,
    NewCoupon,
};

pub use memory::InMemoryStore;

/// Errors raised by a store implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Transient failure (pool exhausted, connection lost). Never retried here.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Internal(String),
}

/// Everything the allocation primitive needs to decide in one atomic step.
#[derive(Debug, Clone)]
pub struct AllocationRequest {
    pub coupon_id: Uuid,
    pub claimant: Claimant,
    pub now: DateTime<Utc>,
    /// Claims by the same identity strictly after this instant block the allocation.
    pub cooldown_since: DateTime<Utc>,
}

/// Result of [`CouponStore::try_allocate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationOutcome {
    /// The coupon was marked used and the claim appended.
    Allocated { coupon: Coupon, claim: Claim },
    /// The coupon stopped being claimable before the write landed.
    Conflict,
    /// The identity claimed something else first. Nothing was written.
    CoolingDown(Claim),
}

/// Result of a guarded administrator mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome<T> {
    Applied(T),
    NotFound,
    /// The coupon is used and the mutation would touch a frozen field.
    Frozen,
}

/// Coupon inventory storage.
#[async_trait::async_trait]
pub trait CouponStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Coupon>, StoreError>;

    /// All coupons, newest first.
    async fn list_all(&self) -> Result<Vec<Coupon>, StoreError>;

    /// Claimable coupons, oldest first (ties in insertion order).
    async fn list_eligible(&self, now: DateTime<Utc>, limit: i64)
        -> Result<Vec<Coupon>, StoreError>;

    async fn count_eligible(&self, now: DateTime<Utc>) -> Result<i64, StoreError>;

    /// Returns which of `codes` are already present, used or not.
    async fn existing_codes(&self, codes: &[String]) -> Result<Vec<String>, StoreError>;

    /// Returns true if a coupon other than `except` carries `code`.
    async fn code_taken_by_other(&self, code: &str, except: Uuid) -> Result<bool, StoreError>;

    /// Inserts every coupon or none of them.
    async fn insert_batch(
        &self,
        coupons: Vec<NewCoupon>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Coupon>, StoreError>;

    /// Applies changes unless the coupon is used and the changes touch its
    /// code or deactivate it. The check and the write are one step.
    async fn update_coupon(
        &self,
        id: Uuid,
        changes: &CouponChanges,
    ) -> Result<MutationOutcome<Coupon>, StoreError>;

    /// Deletes the coupon if it is still unused.
    async fn delete_unused(&self, id: Uuid) -> Result<MutationOutcome<()>, StoreError>;

    /// Flips `is_active` if the coupon is still unused.
    async fn toggle_unused(&self, id: Uuid) -> Result<MutationOutcome<Coupon>, StoreError>;

    async fn stats(&self, now: DateTime<Utc>) -> Result<CouponStats, StoreError>;

    /// The allocation primitive: serialises on the identity, re-checks the
    /// cooldown, marks the coupon used if it is still claimable and appends
    /// the claim. Either all of it happens or none of it does.
    async fn try_allocate(&self, request: AllocationRequest)
        -> Result<AllocationOutcome, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Append-only claim history.
#[async_trait::async_trait]
pub trait ClaimLedger: Send + Sync {
    async fn record(&self, claim: NewClaim) -> Result<Claim, StoreError>;

    /// Most recent claim matching the IP or the session with
    /// `claimed_at > since`.
    async fn find_recent_by_identity(
        &self,
        ip_address: &str,
        session_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Claim>, StoreError>;

    /// Full history, newest first.
    async fn list_all(&self) -> Result<Vec<ClaimRecord>, StoreError>;

    /// The `limit` most recent claims.
    async fn list_recent(&self, limit: i64) -> Result<Vec<ClaimRecord>, StoreError>;
}

/// Administrator account storage.
#[async_trait::async_trait]
pub trait AdminStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Admin>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Admin>, StoreError>;

    /// Fails with [`StoreError::Conflict`] if the email is taken.
    async fn create(&self, admin: NewAdmin) -> Result<Admin, StoreError>;

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;
}

/// The set of stores a running service works against.
#[derive(Clone)]
pub struct Stores {
    pub coupons: Arc<dyn CouponStore>,
    pub claims: Arc<dyn ClaimLedger>,
    pub admins: Arc<dyn AdminStore>,
}

impl Stores {
    /// All three stores backed by one shared in-memory store.
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            coupons: store.clone(),
            claims: store.clone(),
            admins: store,
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
