//! Coupon allocation.
//!
//! The allocator decides whether a claimant may claim and hands out coupons
//! through [`CouponStore::try_allocate`], the only write that can race.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cooldown::{CooldownBlock, CooldownChecker, CooldownStatus, DEFAULT_COOLDOWN_HOURS};
use crate::models::{ClaimedCoupon, Claimant, Coupon, Ineligibility, PublicCoupon};
use crate::store::{AllocationOutcome, AllocationRequest, ClaimLedger, CouponStore, StoreError};

/// Tunables for claiming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimPolicy {
    pub cooldown: Duration,
    /// Candidates fetched per `claim_next` round.
    pub candidate_batch: i64,
    pub max_candidate_rounds: u32,
    /// Coupons shown by `availability`.
    pub listing_limit: i64,
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::hours(DEFAULT_COOLDOWN_HOURS),
            candidate_batch: 10,
            max_candidate_rounds: 3,
            listing_limit: 5,
        }
    }
}

/// Why a claim was refused.
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("Claim cooldown active for {} more hours", .0.remaining_hours())]
    RateLimited(CooldownBlock),

    #[error("Coupon not found")]
    NotFound,

    #[error("Coupon is not active")]
    Inactive,

    #[error("Coupon has already been claimed")]
    AlreadyClaimed,

    #[error("Coupon has expired")]
    Expired,

    #[error("No coupons available")]
    NoneAvailable,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClaimError {
    /// Short label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            ClaimError::RateLimited(_) => "cooldown",
            ClaimError::NotFound => "not_found",
            ClaimError::Inactive => "inactive",
            ClaimError::AlreadyClaimed => "already_claimed",
            ClaimError::Expired => "expired",
            ClaimError::NoneAvailable => "none_available",
            ClaimError::Store(_) => "store_error",
        }
    }
}

impl From<Ineligibility> for ClaimError {
    fn from(reason: Ineligibility) -> Self {
        match reason {
            Ineligibility::Inactive => ClaimError::Inactive,
            Ineligibility::Used => ClaimError::AlreadyClaimed,
            Ineligibility::Expired => ClaimError::Expired,
        }
    }
}

/// What an eligible claimant may currently pick from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Eligible(Vec<PublicCoupon>),
    Blocked(CooldownBlock),
}

/// Whether a claimant may claim, with the number of claimable coupons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible { available_coupons: i64 },
    Blocked(CooldownBlock),
}

/// Hands out coupons to claimants.
#[derive(Clone)]
pub struct CouponAllocator {
    coupons: Arc<dyn CouponStore>,
    cooldown: CooldownChecker,
    policy: ClaimPolicy,
}

impl CouponAllocator {
    pub fn new(
        coupons: Arc<dyn CouponStore>,
        claims: Arc<dyn ClaimLedger>,
        policy: ClaimPolicy,
    ) -> Self {
        Self {
            coupons,
            cooldown: CooldownChecker::new(claims, policy.cooldown),
            policy,
        }
    }

    pub async fn claim_specific(
        &self,
        coupon_id: Uuid,
        claimant: &Claimant,
    ) -> Result<ClaimedCoupon, ClaimError> {
        self.claim_specific_at(coupon_id, claimant, Utc::now()).await
    }

    /// Claims one particular coupon.
    pub async fn claim_specific_at(
        &self,
        coupon_id: Uuid,
        claimant: &Claimant,
        now: DateTime<Utc>,
    ) -> Result<ClaimedCoupon, ClaimError> {
        self.ensure_clear(claimant, now).await?;

        let coupon = self
            .coupons
            .find_by_id(coupon_id)
            .await?
            .ok_or(ClaimError::NotFound)?;
        coupon.check_claimable_at(now)?;

        match self.allocate(&coupon, claimant, now).await? {
            Some(claimed) => {
                log_claimed(claimant, &coupon, "specific");
                Ok(claimed)
            }
            None => {
                debug!(coupon_id = %coupon_id, "Coupon taken by a concurrent claim");
                Err(ClaimError::AlreadyClaimed)
            }
        }
    }

    pub async fn claim_next(&self, claimant: &Claimant) -> Result<ClaimedCoupon, ClaimError> {
        self.claim_next_at(claimant, Utc::now()).await
    }

    /// Claims the oldest claimable coupon.
    ///
    /// Candidates are fetched in batches; a coupon lost to a concurrent claim
    /// moves on to the next candidate. Gives up after
    /// `max_candidate_rounds` batches.
    pub async fn claim_next_at(
        &self,
        claimant: &Claimant,
        now: DateTime<Utc>,
    ) -> Result<ClaimedCoupon, ClaimError> {
        self.ensure_clear(claimant, now).await?;

        for round in 1..=self.policy.max_candidate_rounds {
            let candidates = self
                .coupons
                .list_eligible(now, self.policy.candidate_batch)
                .await?;
            if candidates.is_empty() {
                return Err(ClaimError::NoneAvailable);
            }

            for coupon in &candidates {
                if let Some(claimed) = self.allocate(coupon, claimant, now).await? {
                    log_claimed(claimant, coupon, "next");
                    return Ok(claimed);
                }
            }

            debug!(
                round,
                candidates = candidates.len(),
                "All candidates taken by concurrent claims"
            );
        }

        warn!(
            rounds = self.policy.max_candidate_rounds,
            ip = %claimant.ip_address,
            "Giving up on claim_next after repeated contention"
        );
        Err(ClaimError::NoneAvailable)
    }

    pub async fn list_eligible(&self) -> Result<Vec<PublicCoupon>, ClaimError> {
        self.list_eligible_at(Utc::now()).await
    }

    /// Up to `listing_limit` claimable coupons, oldest first.
    pub async fn list_eligible_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<PublicCoupon>, ClaimError> {
        let coupons = self
            .coupons
            .list_eligible(now, self.policy.listing_limit)
            .await?;
        Ok(coupons.iter().map(Coupon::to_public).collect())
    }

    pub async fn count_eligible(&self) -> Result<i64, ClaimError> {
        self.count_eligible_at(Utc::now()).await
    }

    pub async fn count_eligible_at(&self, now: DateTime<Utc>) -> Result<i64, ClaimError> {
        Ok(self.coupons.count_eligible(now).await?)
    }

    pub async fn availability(&self, claimant: &Claimant) -> Result<Availability, ClaimError> {
        self.availability_at(claimant, Utc::now()).await
    }

    /// Cooldown check followed by the coupon listing.
    pub async fn availability_at(
        &self,
        claimant: &Claimant,
        now: DateTime<Utc>,
    ) -> Result<Availability, ClaimError> {
        match self.cooldown.check_at(claimant, now).await? {
            CooldownStatus::Blocked(block) => Ok(Availability::Blocked(block)),
            CooldownStatus::Clear => Ok(Availability::Eligible(self.list_eligible_at(now).await?)),
        }
    }

    pub async fn eligibility(&self, claimant: &Claimant) -> Result<Eligibility, ClaimError> {
        self.eligibility_at(claimant, Utc::now()).await
    }

    /// Cooldown check followed by the claimable count.
    pub async fn eligibility_at(
        &self,
        claimant: &Claimant,
        now: DateTime<Utc>,
    ) -> Result<Eligibility, ClaimError> {
        match self.cooldown.check_at(claimant, now).await? {
            CooldownStatus::Blocked(block) => Ok(Eligibility::Blocked(block)),
            CooldownStatus::Clear => Ok(Eligibility::Eligible {
                available_coupons: self.count_eligible_at(now).await?,
            }),
        }
    }

    async fn ensure_clear(&self, claimant: &Claimant, now: DateTime<Utc>) -> Result<(), ClaimError> {
        match self.cooldown.check_at(claimant, now).await? {
            CooldownStatus::Clear => Ok(()),
            CooldownStatus::Blocked(block) => {
                debug!(
                    ip = %claimant.ip_address,
                    session_id = %claimant.session_id,
                    remaining_hours = block.remaining_hours(),
                    "Claim refused by cooldown"
                );
                Err(ClaimError::RateLimited(block))
            }
        }
    }

    /// Runs the allocation primitive. `Ok(None)` means the coupon was lost
    /// to a concurrent claim.
    async fn allocate(
        &self,
        coupon: &Coupon,
        claimant: &Claimant,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimedCoupon>, ClaimError> {
        let request = AllocationRequest {
            coupon_id: coupon.id,
            claimant: claimant.clone(),
            now,
            cooldown_since: self.cooldown.window_start(now),
        };

        match self.coupons.try_allocate(request).await? {
            AllocationOutcome::Allocated { coupon, claim } => Ok(Some(ClaimedCoupon {
                code: coupon.code,
                description: coupon.description,
                claimed_at: claim.claimed_at,
            })),
            AllocationOutcome::Conflict => Ok(None),
            AllocationOutcome::CoolingDown(prior) => {
                match super::cooldown::evaluate(Some(&prior), now, self.policy.cooldown) {
                    CooldownStatus::Blocked(block) => Err(ClaimError::RateLimited(block)),
                    // The store only reports claims inside the window.
                    CooldownStatus::Clear => Ok(None),
                }
            }
        }
    }
}

fn log_claimed(claimant: &Claimant, coupon: &Coupon, mode: &'static str) {
    info!(
        coupon_id = %coupon.id,
        code = %coupon.code,
        ip = %claimant.ip_address,
        session_id = %claimant.session_id,
        mode,
        "Coupon claimed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CouponChanges, CouponStats, NewCoupon};
    use crate::store::{InMemoryStore, MutationOutcome};
    use fake::{faker::lorem::en::Sentence, Fake};

    fn allocator(store: &Arc<InMemoryStore>) -> CouponAllocator {
        CouponAllocator::new(store.clone(), store.clone(), ClaimPolicy::default())
    }

    async fn seed(
        store: &InMemoryStore,
        codes: &[&str],
        created_at: DateTime<Utc>,
    ) -> Vec<Coupon> {
        let coupons = codes
            .iter()
            .map(|code| NewCoupon {
                code: code.to_string(),
                description: Sentence(3..6).fake(),
                expires_at: None,
            })
            .collect();
        store.insert_batch(coupons, created_at).await.unwrap()
    }

    fn claimant(n: usize) -> Claimant {
        Claimant::new(format!("10.0.0.{}", n), format!("session-{}", n))
    }

    #[tokio::test]
    async fn test_claim_specific_returns_code_and_description() {
        let store = Arc::new(InMemoryStore::new());
        let now = Utc::now();
        let coupons = seed(&store, &["X10"], now - Duration::hours(1)).await;

        let claimed = allocator(&store)
            .claim_specific_at(coupons[0].id, &claimant(1), now)
            .await
            .unwrap();
        assert_eq!(claimed.code, "X10");
        assert_eq!(claimed.description, coupons[0].description);
        assert_eq!(claimed.claimed_at, now);
    }

    #[tokio::test]
    async fn test_claim_specific_validation_order() {
        let store = Arc::new(InMemoryStore::new());
        let allocator = allocator(&store);
        let now = Utc::now();
        let coupons = seed(&store, &["AAA", "BBB", "CCC"], now - Duration::hours(1)).await;

        let missing = allocator
            .claim_specific_at(Uuid::new_v4(), &claimant(1), now)
            .await;
        assert!(matches!(missing, Err(ClaimError::NotFound)));

        store.toggle_unused(coupons[0].id).await.unwrap();
        let inactive = allocator
            .claim_specific_at(coupons[0].id, &claimant(1), now)
            .await;
        assert!(matches!(inactive, Err(ClaimError::Inactive)));

        let past = CouponChanges {
            expires_at: Some(now - Duration::minutes(1)),
            ..Default::default()
        };
        store.update_coupon(coupons[1].id, &past).await.unwrap();
        let expired = allocator
            .claim_specific_at(coupons[1].id, &claimant(1), now)
            .await;
        assert!(matches!(expired, Err(ClaimError::Expired)));

        allocator
            .claim_specific_at(coupons[2].id, &claimant(2), now)
            .await
            .unwrap();
        let used = allocator
            .claim_specific_at(coupons[2].id, &claimant(3), now)
            .await;
        assert!(matches!(used, Err(ClaimError::AlreadyClaimed)));
    }

    #[tokio::test]
    async fn test_expiry_at_now_is_not_claimable() {
        let store = Arc::new(InMemoryStore::new());
        let now = Utc::now();
        let coupons = seed(&store, &["EDGE"], now - Duration::hours(1)).await;
        let at_now = CouponChanges {
            expires_at: Some(now),
            ..Default::default()
        };
        store.update_coupon(coupons[0].id, &at_now).await.unwrap();

        let result = allocator(&store)
            .claim_specific_at(coupons[0].id, &claimant(1), now)
            .await;
        assert!(matches!(result, Err(ClaimError::Expired)));
    }

    #[tokio::test]
    async fn test_cooldown_checked_before_coupon_lookup() {
        let store = Arc::new(InMemoryStore::new());
        let allocator = allocator(&store);
        let now = Utc::now();
        let coupons = seed(&store, &["AAA"], now - Duration::hours(1)).await;

        allocator
            .claim_specific_at(coupons[0].id, &claimant(1), now)
            .await
            .unwrap();
        let result = allocator
            .claim_specific_at(Uuid::new_v4(), &claimant(1), now)
            .await;
        assert!(matches!(result, Err(ClaimError::RateLimited(_))));
    }

    #[tokio::test]
    async fn test_claim_next_is_fifo() {
        let store = Arc::new(InMemoryStore::new());
        let allocator = allocator(&store);
        let now = Utc::now();
        seed(&store, &["NEWER"], now - Duration::hours(1)).await;
        seed(&store, &["OLDEST", "OLDER"], now - Duration::hours(3)).await;

        let codes = [
            allocator.claim_next_at(&claimant(1), now).await.unwrap().code,
            allocator.claim_next_at(&claimant(2), now).await.unwrap().code,
            allocator.claim_next_at(&claimant(3), now).await.unwrap().code,
        ];
        assert_eq!(codes, ["OLDEST", "OLDER", "NEWER"]);

        let empty = allocator.claim_next_at(&claimant(4), now).await;
        assert!(matches!(empty, Err(ClaimError::NoneAvailable)));
    }

    #[tokio::test]
    async fn test_single_coupon_scenario() {
        let store = Arc::new(InMemoryStore::new());
        let allocator = allocator(&store);
        let now = Utc::now();
        let coupons = seed(&store, &["X10"], now - Duration::hours(1)).await;
        let first = Claimant::new("1.1.1.1", "s1");
        let second = Claimant::new("2.2.2.2", "s2");

        let claimed = allocator
            .claim_specific_at(coupons[0].id, &first, now)
            .await
            .unwrap();
        assert_eq!(claimed.code, "X10");

        let again = allocator.claim_next_at(&first, now).await;
        let Err(ClaimError::RateLimited(block)) = again else {
            panic!("expected cooldown");
        };
        assert_eq!(block.time_left_label(), "24 hours");

        let other = allocator.claim_next_at(&second, now).await;
        assert!(matches!(other, Err(ClaimError::NoneAvailable)));
    }

    #[tokio::test]
    async fn test_cooldown_boundary() {
        let store = Arc::new(InMemoryStore::new());
        let allocator = allocator(&store);
        let t0 = Utc::now();
        seed(&store, &["AAA", "BBB"], t0 - Duration::hours(1)).await;

        allocator.claim_next_at(&claimant(1), t0).await.unwrap();

        let almost = t0 + Duration::hours(24) - Duration::seconds(1);
        let blocked = allocator.claim_next_at(&claimant(1), almost).await;
        assert!(matches!(blocked, Err(ClaimError::RateLimited(_))));

        let exactly = t0 + Duration::hours(24);
        let claimed = allocator.claim_next_at(&claimant(1), exactly).await.unwrap();
        assert_eq!(claimed.code, "BBB");
    }

    #[tokio::test]
    async fn test_availability_and_eligibility() {
        let store = Arc::new(InMemoryStore::new());
        let allocator = allocator(&store);
        let now = Utc::now();
        let codes: Vec<String> = (0..7).map(|i| format!("CODE{}", i)).collect();
        let code_refs: Vec<&str> = codes.iter().map(String::as_str).collect();
        seed(&store, &code_refs, now - Duration::hours(1)).await;

        let Availability::Eligible(listed) = allocator.availability_at(&claimant(1), now).await.unwrap()
        else {
            panic!("expected eligible");
        };
        assert_eq!(listed.len(), 5);
        assert_eq!(listed[0].code, "CODE0");

        assert_eq!(
            allocator.eligibility_at(&claimant(1), now).await.unwrap(),
            Eligibility::Eligible { available_coupons: 7 }
        );

        allocator.claim_next_at(&claimant(1), now).await.unwrap();
        assert!(matches!(
            allocator.availability_at(&claimant(1), now).await.unwrap(),
            Availability::Blocked(_)
        ));
        assert!(matches!(
            allocator.eligibility_at(&claimant(1), now).await.unwrap(),
            Eligibility::Blocked(_)
        ));
        assert_eq!(allocator.count_eligible_at(now).await.unwrap(), 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claim_next_never_double_allocates() {
        let store = Arc::new(InMemoryStore::new());
        let allocator = allocator(&store);
        let codes: Vec<String> = (0..10).map(|i| format!("RACE{:02}", i)).collect();
        let code_refs: Vec<&str> = codes.iter().map(String::as_str).collect();
        seed(&store, &code_refs, Utc::now() - Duration::hours(1)).await;

        let handles: Vec<_> = (0..50)
            .map(|n| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.claim_next(&claimant(n)).await })
            })
            .collect();

        let mut claimed = Vec::new();
        let mut none_available = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(coupon) => claimed.push(coupon.code),
                Err(ClaimError::NoneAvailable) => none_available += 1,
                Err(e) => panic!("unexpected error: {:?}", e),
            }
        }

        claimed.sort();
        claimed.dedup();
        assert_eq!(claimed.len(), 10);
        assert_eq!(none_available, 40);
        assert_eq!(ClaimLedger::list_all(store.as_ref()).await.unwrap().len(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claim_specific_single_winner() {
        let store = Arc::new(InMemoryStore::new());
        let allocator = allocator(&store);
        let coupons = seed(&store, &["ONLY"], Utc::now() - Duration::hours(1)).await;
        let coupon_id = coupons[0].id;

        let handles: Vec<_> = (0..20)
            .map(|n| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.claim_specific(coupon_id, &claimant(n)).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(ClaimError::AlreadyClaimed) => {}
                Err(e) => panic!("unexpected error: {:?}", e),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_identity_gets_one_coupon() {
        let store = Arc::new(InMemoryStore::new());
        let allocator = allocator(&store);
        seed(
            &store,
            &["AAA", "BBB", "CCC", "DDD", "EEE"],
            Utc::now() - Duration::hours(1),
        )
        .await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.claim_next(&claimant(1)).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(ClaimError::RateLimited(_)) => {}
                Err(e) => panic!("unexpected error: {:?}", e),
            }
        }
        assert_eq!(winners, 1);

        let stats: CouponStats = store.stats(Utc::now()).await.unwrap();
        assert_eq!(stats.used_coupons, 1);
    }

    /// Delegates to an in-memory store but loses every allocation race.
    /// Store whose allocation primitive always loses the race, or fails
    /// outright when `allocate_error` is set.
    struct ContendedStore {
        inner: InMemoryStore,
        allocate_error: Option<StoreError>,
    }

    impl ContendedStore {
        fn new() -> Self {
            Self {
                inner: InMemoryStore::new(),
                allocate_error: None,
            }
        }

        fn failing(error: StoreError) -> Self {
            Self {
                inner: InMemoryStore::new(),
                allocate_error: Some(error),
            }
        }
    }

    #[async_trait::async_trait]
    impl CouponStore for ContendedStore {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<Coupon>, StoreError> {
            CouponStore::find_by_id(&self.inner, id).await
        }
        async fn list_all(&self) -> Result<Vec<Coupon>, StoreError> {
            CouponStore::list_all(&self.inner).await
        }
        async fn list_eligible(
            &self,
            now: DateTime<Utc>,
            limit: i64,
        ) -> Result<Vec<Coupon>, StoreError> {
            self.inner.list_eligible(now, limit).await
        }
        async fn count_eligible(&self, now: DateTime<Utc>) -> Result<i64, StoreError> {
            self.inner.count_eligible(now).await
        }
        async fn existing_codes(&self, codes: &[String]) -> Result<Vec<String>, StoreError> {
            self.inner.existing_codes(codes).await
        }
        async fn code_taken_by_other(&self, code: &str, except: Uuid) -> Result<bool, StoreError> {
            self.inner.code_taken_by_other(code, except).await
        }
        async fn insert_batch(
            &self,
            coupons: Vec<NewCoupon>,
            now: DateTime<Utc>,
        ) -> Result<Vec<Coupon>, StoreError> {
            self.inner.insert_batch(coupons, now).await
        }
        async fn update_coupon(
            &self,
            id: Uuid,
            changes: &CouponChanges,
        ) -> Result<MutationOutcome<Coupon>, StoreError> {
            self.inner.update_coupon(id, changes).await
        }
        async fn delete_unused(&self, id: Uuid) -> Result<MutationOutcome<()>, StoreError> {
            self.inner.delete_unused(id).await
        }
        async fn toggle_unused(&self, id: Uuid) -> Result<MutationOutcome<Coupon>, StoreError> {
            self.inner.toggle_unused(id).await
        }
        async fn stats(&self, now: DateTime<Utc>) -> Result<CouponStats, StoreError> {
            self.inner.stats(now).await
        }
        async fn try_allocate(
            &self,
            _request: AllocationRequest,
        ) -> Result<AllocationOutcome, StoreError> {
            match &self.allocate_error {
                Some(error) => Err(error.clone()),
                None => Ok(AllocationOutcome::Conflict),
            }
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_claim_next_gives_up_after_bounded_rounds() {
        let store = Arc::new(ContendedStore::new());
        seed(&store.inner, &["AAA", "BBB"], Utc::now() - Duration::hours(1)).await;
        let ledger = Arc::new(InMemoryStore::new());
        let allocator = CouponAllocator::new(store, ledger, ClaimPolicy::default());

        let result = allocator.claim_next(&claimant(1)).await;
        assert!(matches!(result, Err(ClaimError::NoneAvailable)));
    }

    #[tokio::test]
    async fn test_allocation_failure_reaches_caller() {
        let store = Arc::new(ContendedStore::failing(StoreError::Unavailable(
            "pool timed out".to_string(),
        )));
        let seeded = seed(&store.inner, &["AAA"], Utc::now() - Duration::hours(1)).await;
        let ledger = Arc::new(InMemoryStore::new());
        let allocator = CouponAllocator::new(store.clone(), ledger.clone(), ClaimPolicy::default());

        let specific = allocator.claim_specific(seeded[0].id, &claimant(1)).await;
        let Err(err) = specific else {
            panic!("expected a store error, got {:?}", specific);
        };
        assert_eq!(err.reason(), "store_error");
        assert!(matches!(err, ClaimError::Store(StoreError::Unavailable(_))));

        let next = allocator.claim_next(&claimant(1)).await;
        assert!(matches!(
            next,
            Err(ClaimError::Store(StoreError::Unavailable(_)))
        ));

        // Nothing was marked or recorded.
        let coupon = CouponStore::find_by_id(&store.inner, seeded[0].id)
            .await
            .unwrap()
            .unwrap();
        assert!(!coupon.is_used);
        assert!(ClaimLedger::list_all(ledger.as_ref()).await.unwrap().is_empty());
    }
}
