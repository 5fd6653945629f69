//! Claim ledger repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::{Claim, ClaimRecord, Claimant, NewClaim};
use domain::store::{ClaimLedger, StoreError};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::entities::{ClaimEntity, ClaimWithCouponEntity};
use crate::error::store_error;
use crate::metrics::QueryTimer;

/// Most recent claim by IP or session newer than `since`. Runs on any
/// executor so allocation can re-check inside its transaction.
pub(crate) async fn find_recent_claim<'e, E>(
    executor: E,
    ip_address: &str,
    session_id: &str,
    since: DateTime<Utc>,
) -> Result<Option<ClaimEntity>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, ClaimEntity>(
        r#"
        SELECT id, coupon_id, ip_address, session_id, user_agent, claimed_at
        FROM claims
        WHERE (ip_address = $1 OR session_id = $2)
          AND claimed_at > $3
        ORDER BY claimed_at DESC
        LIMIT 1
        "#,
    )
    .bind(ip_address)
    .bind(session_id)
    .bind(since)
    .fetch_optional(executor)
    .await
}

/// Appends a claim row.
pub(crate) async fn insert_claim<'e, E>(
    executor: E,
    coupon_id: Uuid,
    claimant: &Claimant,
    claimed_at: DateTime<Utc>,
) -> Result<ClaimEntity, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, ClaimEntity>(
        r#"
        INSERT INTO claims (coupon_id, ip_address, session_id, user_agent, claimed_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, coupon_id, ip_address, session_id, user_agent, claimed_at
        "#,
    )
    .bind(coupon_id)
    .bind(&claimant.ip_address)
    .bind(&claimant.session_id)
    .bind(claimant.user_agent.as_deref())
    .bind(claimed_at)
    .fetch_one(executor)
    .await
}

/// Repository for the append-only claim ledger.
#[derive(Clone)]
pub struct ClaimRepository {
    pool: PgPool,
}

impl ClaimRepository {
    /// Creates a new ClaimRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn history(&self, limit: Option<i64>) -> Result<Vec<ClaimRecord>, StoreError> {
        let timer = QueryTimer::new("list_claim_history");
        // LIMIT NULL means no limit.
        let result = sqlx::query_as::<_, ClaimWithCouponEntity>(
            r#"
            SELECT
                cl.id, cl.coupon_id, cl.ip_address, cl.session_id, cl.user_agent, cl.claimed_at,
                co.code as coupon_code, co.description as coupon_description
            FROM claims cl
            LEFT JOIN coupons co ON co.id = cl.coupon_id
            ORDER BY cl.claimed_at DESC
            LIMIT $1
            "#,
        )
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
}

#[async_trait::async_trait]
impl ClaimLedger for ClaimRepository {
    async fn record(&self, claim: NewClaim) -> Result<Claim, StoreError> {
        let timer = QueryTimer::new("insert_claim");
        let result = insert_claim(&self.pool, claim.coupon_id, &claim.claimant, claim.claimed_at).await;
        timer.record();
        Ok(result.map_err(store_error)?.into())
    }

    async fn find_recent_by_identity(
        &self,
        ip_address: &str,
        session_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Claim>, StoreError> {
        let timer = QueryTimer::new("find_recent_claim_by_identity");
        let result = find_recent_claim(&self.pool, ip_address, session_id, since).await;
        timer.record();
        Ok(result.map_err(store_error)?.map(Into::into))
    }

    async fn list_all(&self) -> Result<Vec<ClaimRecord>, StoreError> {
        self.history(None).await
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<ClaimRecord>, StoreError> {
        self.history(Some(limit.max(0))).await
    }
}
