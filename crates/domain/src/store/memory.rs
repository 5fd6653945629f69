//! In-process store.
//!
//! One mutex guards coupons, claims and admins together, so every trait
//! method is atomic with respect to every other. No lock is held across an
//! `.await`.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    AdminStore, AllocationOutcome, AllocationRequest, ClaimLedger, CouponStore, MutationOutcome,
    StoreError,
};
use crate::models::admin::ADMIN_ROLE;
use crate::models::{
    Admin, Claim, ClaimCouponInfo, ClaimRecord, Coupon, CouponChanges, CouponStats, NewAdmin,
    NewClaim, NewCoupon,
};

#[derive(Debug, Default)]
struct State {
    /// Insertion order.
    coupons: Vec<Coupon>,
    /// Append order.
    claims: Vec<Claim>,
    admins: Vec<Admin>,
}

impl State {
    fn coupon(&self, id: Uuid) -> Option<&Coupon> {
        self.coupons.iter().find(|c| c.id == id)
    }

    fn recent_claim(&self, ip: &str, session: &str, since: DateTime<Utc>) -> Option<&Claim> {
        self.claims
            .iter()
            .filter(|c| c.claimed_at > since && (c.ip_address == ip || c.session_id == session))
            .max_by_key(|c| c.claimed_at)
    }

    fn eligible(&self, now: DateTime<Utc>) -> Vec<&Coupon> {
        let mut eligible: Vec<&Coupon> = self
            .coupons
            .iter()
            .filter(|c| c.is_claimable_at(now))
            .collect();
        // Stable, so equal timestamps stay in insertion order.
        eligible.sort_by_key(|c| c.created_at);
        eligible
    }

    fn record(&self, claim: &Claim) -> ClaimRecord {
        ClaimRecord {
            id: claim.id,
            coupon: self.coupon(claim.coupon_id).map(|c| ClaimCouponInfo {
                id: c.id,
                code: c.code.clone(),
                description: c.description.clone(),
            }),
            ip_address: claim.ip_address.clone(),
            session_id: claim.session_id.clone(),
            user_agent: claim.user_agent.clone(),
            claimed_at: claim.claimed_at,
        }
    }

    fn history(&self) -> Vec<ClaimRecord> {
        let mut claims: Vec<&Claim> = self.claims.iter().rev().collect();
        claims.sort_by(|a, b| b.claimed_at.cmp(&a.claimed_at));
        claims.into_iter().map(|c| self.record(c)).collect()
    }
}

/// In-memory implementation of every store trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Internal("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl CouponStore for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Coupon>, StoreError> {
        Ok(self.state()?.coupon(id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Coupon>, StoreError> {
        let state = self.state()?;
        let mut coupons: Vec<Coupon> = state.coupons.iter().rev().cloned().collect();
        coupons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(coupons)
    }

    async fn list_eligible(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Coupon>, StoreError> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(self
            .state()?
            .eligible(now)
            .into_iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_eligible(&self, now: DateTime<Utc>) -> Result<i64, StoreError> {
        Ok(self.state()?.eligible(now).len() as i64)
    }

    async fn existing_codes(&self, codes: &[String]) -> Result<Vec<String>, StoreError> {
        let state = self.state()?;
        let present: HashSet<&str> = state.coupons.iter().map(|c| c.code.as_str()).collect();
        Ok(codes
            .iter()
            .filter(|code| present.contains(code.as_str()))
            .cloned()
            .collect())
    }

    async fn code_taken_by_other(&self, code: &str, except: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .state()?
            .coupons
            .iter()
            .any(|c| c.code == code && c.id != except))
    }

    async fn insert_batch(
        &self,
        coupons: Vec<NewCoupon>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Coupon>, StoreError> {
        let mut state = self.state()?;

        let mut seen: HashSet<&str> = state.coupons.iter().map(|c| c.code.as_str()).collect();
        for coupon in &coupons {
            if !seen.insert(coupon.code.as_str()) {
                return Err(StoreError::Conflict(format!(
                    "coupon code '{}' already exists",
                    coupon.code
                )));
            }
        }

        let created: Vec<Coupon> = coupons
            .into_iter()
            .map(|c| Coupon {
                id: Uuid::new_v4(),
                code: c.code,
                description: c.description,
                is_active: true,
                is_used: false,
                used_at: None,
                expires_at: c.expires_at,
                created_at: now,
            })
            .collect();
        state.coupons.extend(created.iter().cloned());
        Ok(created)
    }

    async fn update_coupon(
        &self,
        id: Uuid,
        changes: &CouponChanges,
    ) -> Result<MutationOutcome<Coupon>, StoreError> {
        let mut guard = self.state()?;
        let state = &mut *guard;

        if let Some(code) = &changes.code {
            if state.coupons.iter().any(|c| &c.code == code && c.id != id) {
                return Err(StoreError::Conflict(format!(
                    "coupon code '{}' already exists",
                    code
                )));
            }
        }

        let Some(coupon) = state.coupons.iter_mut().find(|c| c.id == id) else {
            return Ok(MutationOutcome::NotFound);
        };
        if changes.frozen_violation(coupon).is_some() {
            return Ok(MutationOutcome::Frozen);
        }
        changes.apply_to(coupon);
        Ok(MutationOutcome::Applied(coupon.clone()))
    }

    async fn delete_unused(&self, id: Uuid) -> Result<MutationOutcome<()>, StoreError> {
        let mut state = self.state()?;
        let Some(index) = state.coupons.iter().position(|c| c.id == id) else {
            return Ok(MutationOutcome::NotFound);
        };
        if state.coupons[index].is_used {
            return Ok(MutationOutcome::Frozen);
        }
        state.coupons.remove(index);
        Ok(MutationOutcome::Applied(()))
    }

    async fn toggle_unused(&self, id: Uuid) -> Result<MutationOutcome<Coupon>, StoreError> {
        let mut state = self.state()?;
        let Some(coupon) = state.coupons.iter_mut().find(|c| c.id == id) else {
            return Ok(MutationOutcome::NotFound);
        };
        if coupon.is_used {
            return Ok(MutationOutcome::Frozen);
        }
        coupon.is_active = !coupon.is_active;
        Ok(MutationOutcome::Applied(coupon.clone()))
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<CouponStats, StoreError> {
        let state = self.state()?;
        let mut stats = CouponStats {
            total_coupons: state.coupons.len() as i64,
            ..Default::default()
        };
        for coupon in &state.coupons {
            if coupon.is_used {
                stats.used_coupons += 1;
                continue;
            }
            if coupon.is_active {
                stats.active_coupons += 1;
            }
            if coupon.is_expired_at(now) {
                stats.expired_coupons += 1;
            } else if coupon.is_active {
                stats.available_coupons += 1;
            }
        }
        Ok(stats)
    }

    async fn try_allocate(
        &self,
        request: AllocationRequest,
    ) -> Result<AllocationOutcome, StoreError> {
        let mut guard = self.state()?;
        let state = &mut *guard;

        if let Some(prior) = state.recent_claim(
            &request.claimant.ip_address,
            &request.claimant.session_id,
            request.cooldown_since,
        ) {
            return Ok(AllocationOutcome::CoolingDown(prior.clone()));
        }

        let Some(coupon) = state.coupons.iter_mut().find(|c| c.id == request.coupon_id) else {
            return Ok(AllocationOutcome::Conflict);
        };
        if !coupon.is_claimable_at(request.now) {
            return Ok(AllocationOutcome::Conflict);
        }
        coupon.is_used = true;
        coupon.used_at = Some(request.now);
        let coupon = coupon.clone();

        let claim = NewClaim {
            coupon_id: coupon.id,
            claimant: request.claimant,
            claimed_at: request.now,
        }
        .into_claim(Uuid::new_v4());
        state.claims.push(claim.clone());

        Ok(AllocationOutcome::Allocated { coupon, claim })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.state().map(|_| ())
    }
}

#[async_trait::async_trait]
impl ClaimLedger for InMemoryStore {
    async fn record(&self, claim: NewClaim) -> Result<Claim, StoreError> {
        let claim = claim.into_claim(Uuid::new_v4());
        self.state()?.claims.push(claim.clone());
        Ok(claim)
    }

    async fn find_recent_by_identity(
        &self,
        ip_address: &str,
        session_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Claim>, StoreError> {
        Ok(self
            .state()?
            .recent_claim(ip_address, session_id, since)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<ClaimRecord>, StoreError> {
        Ok(self.state()?.history())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<ClaimRecord>, StoreError> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let mut history = self.state()?.history();
        history.truncate(limit);
        Ok(history)
    }
}

#[async_trait::async_trait]
impl AdminStore for InMemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Admin>, StoreError> {
        Ok(self
            .state()?
            .admins
            .iter()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Admin>, StoreError> {
        Ok(self.state()?.admins.iter().find(|a| a.id == id).cloned())
    }

    async fn create(&self, admin: NewAdmin) -> Result<Admin, StoreError> {
        let mut state = self.state()?;
        if state.admins.iter().any(|a| a.email == admin.email) {
            return Err(StoreError::Conflict(format!(
                "admin '{}' already exists",
                admin.email
            )));
        }

        let admin = Admin {
            id: Uuid::new_v4(),
            name: admin.name,
            email: admin.email,
            password_hash: admin.password_hash,
            role: ADMIN_ROLE.to_string(),
            created_at: Utc::now(),
            last_login: None,
        };
        state.admins.push(admin.clone());
        Ok(admin)
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(admin) = self.state()?.admins.iter_mut().find(|a| a.id == id) {
            admin.last_login = Some(at);
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.state()?.admins.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Claimant;
    use chrono::Duration;

    fn new_coupon(code: &str) -> NewCoupon {
        NewCoupon {
            code: code.to_string(),
            description: format!("{} description", code),
            expires_at: None,
        }
    }

    fn request(coupon_id: Uuid, claimant: Claimant, now: DateTime<Utc>) -> AllocationRequest {
        AllocationRequest {
            coupon_id,
            claimant,
            now,
            cooldown_since: now - Duration::hours(24),
        }
    }

    #[tokio::test]
    async fn test_insert_batch_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.insert_batch(vec![new_coupon("AAA")], now).await.unwrap();

        let result = store
            .insert_batch(vec![new_coupon("BBB"), new_coupon("AAA")], now)
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let result = store
            .insert_batch(vec![new_coupon("CCC"), new_coupon("CCC")], now)
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        assert_eq!(CouponStore::list_all(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_eligible_is_fifo_with_insertion_tiebreak() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store
            .insert_batch(vec![new_coupon("NEW")], now - Duration::minutes(1))
            .await
            .unwrap();
        store
            .insert_batch(
                vec![new_coupon("OLD1"), new_coupon("OLD2")],
                now - Duration::hours(1),
            )
            .await
            .unwrap();

        let eligible = store.list_eligible(now, 10).await.unwrap();
        let codes: Vec<&str> = eligible.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["OLD1", "OLD2", "NEW"]);

        let all = CouponStore::list_all(&store).await.unwrap();
        assert_eq!(all[0].code, "NEW");
        assert_eq!(store.list_eligible(now, 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_try_allocate_marks_used_and_appends_claim() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let coupon = store.insert_batch(vec![new_coupon("X10")], now).await.unwrap()[0].clone();

        let outcome = store
            .try_allocate(request(coupon.id, Claimant::new("1.1.1.1", "s1"), now))
            .await
            .unwrap();
        let AllocationOutcome::Allocated { coupon: used, claim } = outcome else {
            panic!("expected allocation");
        };
        assert!(used.is_used);
        assert_eq!(used.used_at, Some(now));
        assert_eq!(claim.coupon_id, coupon.id);

        let again = store
            .try_allocate(request(coupon.id, Claimant::new("2.2.2.2", "s2"), now))
            .await
            .unwrap();
        assert_eq!(again, AllocationOutcome::Conflict);
        assert_eq!(ClaimLedger::list_all(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_try_allocate_rechecks_cooldown() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let created = store
            .insert_batch(vec![new_coupon("AAA"), new_coupon("BBB")], now)
            .await
            .unwrap();

        store
            .try_allocate(request(created[0].id, Claimant::new("1.1.1.1", "s1"), now))
            .await
            .unwrap();
        let outcome = store
            .try_allocate(request(created[1].id, Claimant::new("9.9.9.9", "s1"), now))
            .await
            .unwrap();
        assert!(matches!(outcome, AllocationOutcome::CoolingDown(_)));

        let untouched = CouponStore::find_by_id(&store, created[1].id).await.unwrap().unwrap();
        assert!(!untouched.is_used);
    }

    #[tokio::test]
    async fn test_recent_claim_boundary_is_exclusive() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let claimed_at = now - Duration::hours(24);
        store
            .record(NewClaim {
                coupon_id: Uuid::new_v4(),
                claimant: Claimant::new("1.1.1.1", "s1"),
                claimed_at,
            })
            .await
            .unwrap();

        let since = now - Duration::hours(24);
        assert!(store
            .find_recent_by_identity("1.1.1.1", "other", since)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_recent_by_identity("other", "s1", since - Duration::seconds(1))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_guarded_mutations_on_used_coupon() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let coupon = store.insert_batch(vec![new_coupon("USED")], now).await.unwrap()[0].clone();
        store
            .try_allocate(request(coupon.id, Claimant::new("1.1.1.1", "s1"), now))
            .await
            .unwrap();

        assert_eq!(
            store.delete_unused(coupon.id).await.unwrap(),
            MutationOutcome::Frozen
        );
        assert_eq!(
            store.toggle_unused(coupon.id).await.unwrap(),
            MutationOutcome::Frozen
        );

        let rename = CouponChanges {
            code: Some("RENAMED".to_string()),
            ..Default::default()
        };
        assert_eq!(
            store.update_coupon(coupon.id, &rename).await.unwrap(),
            MutationOutcome::Frozen
        );

        let describe = CouponChanges {
            description: Some("still editable".to_string()),
            ..Default::default()
        };
        let MutationOutcome::Applied(updated) =
            store.update_coupon(coupon.id, &describe).await.unwrap()
        else {
            panic!("description edit should apply");
        };
        assert_eq!(updated.description, "still editable");
        assert_eq!(
            store.delete_unused(Uuid::new_v4()).await.unwrap(),
            MutationOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_stats_counts() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let mut expired = new_coupon("EXP");
        expired.expires_at = Some(now - Duration::hours(1));
        let created = store
            .insert_batch(
                vec![new_coupon("A01"), new_coupon("B02"), new_coupon("C03"), expired],
                now - Duration::hours(2),
            )
            .await
            .unwrap();

        store.toggle_unused(created[1].id).await.unwrap();
        store
            .try_allocate(request(created[2].id, Claimant::new("1.1.1.1", "s1"), now))
            .await
            .unwrap();

        let stats = store.stats(now).await.unwrap();
        assert_eq!(
            stats,
            CouponStats {
                total_coupons: 4,
                used_coupons: 1,
                active_coupons: 2,
                expired_coupons: 1,
                available_coupons: 1,
            }
        );
        assert_eq!(store.count_eligible(now).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_claim_history_joins_coupon() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let created = store
            .insert_batch(vec![new_coupon("AAA"), new_coupon("BBB")], now)
            .await
            .unwrap();
        store
            .try_allocate(request(created[0].id, Claimant::new("1.1.1.1", "s1"), now))
            .await
            .unwrap();
        let later = now + Duration::minutes(5);
        store
            .try_allocate(request(created[1].id, Claimant::new("2.2.2.2", "s2"), later))
            .await
            .unwrap();

        let history = ClaimLedger::list_all(&store).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].coupon.as_ref().unwrap().code, "BBB");
        assert_eq!(history[1].coupon.as_ref().unwrap().code, "AAA");
        assert_eq!(store.list_recent(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_admin_email_unique() {
        let store = InMemoryStore::new();
        let admin = NewAdmin {
            name: "Ops".to_string(),
            email: "ops@example.com".to_string(),
            password_hash: "hash".to_string(),
        };
        let created = store.create(admin.clone()).await.unwrap();
        assert_eq!(created.role, "admin");
        assert!(matches!(
            store.create(admin).await,
            Err(StoreError::Conflict(_))
        ));

        store.record_login(created.id, Utc::now()).await.unwrap();
        let found = store.find_by_email("ops@example.com").await.unwrap().unwrap();
        assert!(found.last_login.is_some());
        assert_eq!(AdminStore::count(&store).await.unwrap(), 1);
    }
}
