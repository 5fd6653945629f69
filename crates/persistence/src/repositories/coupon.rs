//! Coupon repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::{Coupon, CouponChanges, CouponStats, NewCoupon};
use domain::store::{
    AllocationOutcome, AllocationRequest, CouponStore, MutationOutcome, StoreError,
};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::claim::{find_recent_claim, insert_claim};
use crate::entities::{CouponEntity, CouponStatsEntity};
use crate::error::store_error;
use crate::metrics::QueryTimer;

/// Repository for coupon-related database operations.
#[derive(Clone)]
pub struct CouponRepository {
    pool: PgPool,
}

impl CouponRepository {
    /// Creates a new CouponRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: Uuid) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("coupon_exists");
        let result = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM coupons WHERE id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map_err(store_error)
    }

    /// Distinguishes a missing coupon from a used one after a guarded write
    /// touched no rows.
    async fn rejected(&self, id: Uuid) -> Result<MutationOutcome<()>, StoreError> {
        Ok(if self.exists(id).await? {
            MutationOutcome::Frozen
        } else {
            MutationOutcome::NotFound
        })
    }
}

#[async_trait::async_trait]
impl CouponStore for CouponRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Coupon>, StoreError> {
        let timer = QueryTimer::new("find_coupon_by_id");
        let result = sqlx::query_as::<_, CouponEntity>(
            r#"
            SELECT id, code, description, is_active, is_used, used_at, expires_at, created_at
            FROM coupons
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(store_error)?.map(Into::into))
    }

    async fn list_all(&self) -> Result<Vec<Coupon>, StoreError> {
        let timer = QueryTimer::new("list_all_coupons");
        let result = sqlx::query_as::<_, CouponEntity>(
            r#"
            SELECT id, code, description, is_active, is_used, used_at, expires_at, created_at
            FROM coupons
            ORDER BY created_at DESC, position DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result
            .map_err(store_error)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn list_eligible(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Coupon>, StoreError> {
        let timer = QueryTimer::new("list_eligible_coupons");
        let result = sqlx::query_as::<_, CouponEntity>(
            r#"
            SELECT id, code, description, is_active, is_used, used_at, expires_at, created_at
            FROM coupons
            WHERE is_active AND NOT is_used
              AND (expires_at IS NULL OR expires_at > $1)
            ORDER BY created_at ASC, position ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result
            .map_err(store_error)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn count_eligible(&self, now: DateTime<Utc>) -> Result<i64, StoreError> {
        let timer = QueryTimer::new("count_eligible_coupons");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM coupons
            WHERE is_active AND NOT is_used
              AND (expires_at IS NULL OR expires_at > $1)
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map_err(store_error)
    }

    async fn existing_codes(&self, codes: &[String]) -> Result<Vec<String>, StoreError> {
        let timer = QueryTimer::new("find_existing_coupon_codes");
        let result = sqlx::query_scalar::<_, String>(
            r#"
            SELECT code FROM coupons WHERE code = ANY($1)
            "#,
        )
        .bind(codes)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result.map_err(store_error)
    }

    async fn code_taken_by_other(&self, code: &str, except: Uuid) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("check_coupon_code_taken");
        let result = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM coupons WHERE code = $1 AND id <> $2)
            "#,
        )
        .bind(code)
        .bind(except)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map_err(store_error)
    }

    async fn insert_batch(
        &self,
        coupons: Vec<NewCoupon>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Coupon>, StoreError> {
        let timer = QueryTimer::new("insert_coupons_batch");
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        let mut created = Vec::with_capacity(coupons.len());

        // A unique violation on any row drops `tx`, rolling back the batch.
        for coupon in &coupons {
            let entity = sqlx::query_as::<_, CouponEntity>(
                r#"
                INSERT INTO coupons (code, description, expires_at, created_at)
                VALUES ($1, $2, $3, $4)
                RETURNING id, code, description, is_active, is_used, used_at, expires_at, created_at
                "#,
            )
            .bind(&coupon.code)
            .bind(&coupon.description)
            .bind(coupon.expires_at)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(store_error)?;
            created.push(entity.into());
        }

        tx.commit().await.map_err(store_error)?;
        timer.record();
        Ok(created)
    }

    async fn update_coupon(
        &self,
        id: Uuid,
        changes: &CouponChanges,
    ) -> Result<MutationOutcome<Coupon>, StoreError> {
        let timer = QueryTimer::new("update_coupon");
        let result = sqlx::query_as::<_, CouponEntity>(
            r#"
            UPDATE coupons
            SET code = COALESCE($2, code),
                description = COALESCE($3, description),
                is_active = COALESCE($4, is_active),
                expires_at = COALESCE($5, expires_at)
            WHERE id = $1
              AND (NOT is_used
                   OR (($2::VARCHAR IS NULL OR $2 = code)
                       AND ($4::BOOLEAN IS NULL OR $4)))
            RETURNING id, code, description, is_active, is_used, used_at, expires_at, created_at
            "#,
        )
        .bind(id)
        .bind(changes.code.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.is_active)
        .bind(changes.expires_at)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        match result.map_err(store_error)? {
            Some(entity) => Ok(MutationOutcome::Applied(entity.into())),
            None => Ok(match self.rejected(id).await? {
                MutationOutcome::NotFound => MutationOutcome::NotFound,
                _ => MutationOutcome::Frozen,
            }),
        }
    }

    async fn delete_unused(&self, id: Uuid) -> Result<MutationOutcome<()>, StoreError> {
        let timer = QueryTimer::new("delete_unused_coupon");
        let result = sqlx::query(
            r#"
            DELETE FROM coupons
            WHERE id = $1 AND NOT is_used
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        timer.record();

        if result.rows_affected() > 0 {
            Ok(MutationOutcome::Applied(()))
        } else {
            self.rejected(id).await
        }
    }

    async fn toggle_unused(&self, id: Uuid) -> Result<MutationOutcome<Coupon>, StoreError> {
        let timer = QueryTimer::new("toggle_unused_coupon");
        let result = sqlx::query_as::<_, CouponEntity>(
            r#"
            UPDATE coupons
            SET is_active = NOT is_active
            WHERE id = $1 AND NOT is_used
            RETURNING id, code, description, is_active, is_used, used_at, expires_at, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        match result.map_err(store_error)? {
            Some(entity) => Ok(MutationOutcome::Applied(entity.into())),
            None => Ok(match self.rejected(id).await? {
                MutationOutcome::NotFound => MutationOutcome::NotFound,
                _ => MutationOutcome::Frozen,
            }),
        }
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<CouponStats, StoreError> {
        let timer = QueryTimer::new("coupon_stats");
        let result = sqlx::query_as::<_, CouponStatsEntity>(
            r#"
            SELECT
                COUNT(*) AS total_coupons,
                COUNT(*) FILTER (WHERE is_used) AS used_coupons,
                COUNT(*) FILTER (WHERE is_active AND NOT is_used) AS active_coupons,
                COUNT(*) FILTER (WHERE NOT is_used AND expires_at <= $1) AS expired_coupons,
                COUNT(*) FILTER (
                    WHERE is_active AND NOT is_used
                      AND (expires_at IS NULL OR expires_at > $1)
                ) AS available_coupons
            FROM coupons
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(store_error)?.into())
    }

    async fn try_allocate(
        &self,
        request: AllocationRequest,
    ) -> Result<AllocationOutcome, StoreError> {
        let timer = QueryTimer::new("allocate_coupon");
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        // Sorted keys, so claimants sharing an IP or a session queue up
        // behind each other instead of deadlocking.
        for key in request.claimant.lock_keys() {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(&key)
                .execute(&mut *tx)
                .await
                .map_err(store_error)?;
        }

        if let Some(prior) = find_recent_claim(
            &mut *tx,
            &request.claimant.ip_address,
            &request.claimant.session_id,
            request.cooldown_since,
        )
        .await
        .map_err(store_error)?
        {
            timer.record();
            debug!(claim_id = %prior.id, "Allocation blocked by a claim from the same identity");
            return Ok(AllocationOutcome::CoolingDown(prior.into()));
        }

        let marked = sqlx::query_as::<_, CouponEntity>(
            r#"
            UPDATE coupons
            SET is_used = TRUE, used_at = $2
            WHERE id = $1
              AND is_active AND NOT is_used
              AND (expires_at IS NULL OR expires_at > $2)
            RETURNING id, code, description, is_active, is_used, used_at, expires_at, created_at
            "#,
        )
        .bind(request.coupon_id)
        .bind(request.now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_error)?;

        let Some(coupon) = marked else {
            timer.record();
            debug!(coupon_id = %request.coupon_id, "Coupon no longer claimable at write time");
            return Ok(AllocationOutcome::Conflict);
        };

        let claim = insert_claim(
            &mut *tx,
            coupon.id,
            &request.claimant,
            request.now,
        )
        .await
        .map_err(store_error)?;

        tx.commit().await.map_err(store_error)?;
        timer.record();

        Ok(AllocationOutcome::Allocated {
            coupon: coupon.into(),
            claim: claim.into(),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(store_error)
    }
}
