//! Administrator-side coupon inventory management.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::{ClaimRecord, Coupon, CouponChanges, DashboardStats, NewCoupon};
use crate::store::{ClaimLedger, CouponStore, MutationOutcome, StoreError};

/// Default upper bound for a bulk create.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;

/// Number of claims shown on the dashboard.
pub const DASHBOARD_RECENT_CLAIMS: i64 = 5;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Coupon not found")]
    NotFound,

    #[error("At least one coupon is required")]
    EmptyBatch,

    #[error("Batch of {size} coupons exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Duplicate codes in request: {}", .0.join(", "))]
    DuplicateInBatch(Vec<String>),

    #[error("Codes already exist: {}", .0.join(", "))]
    CodesExist(Vec<String>),

    #[error("Coupon code '{0}' is already in use")]
    CodeTaken(String),

    #[error("{0}")]
    UsedCouponFrozen(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Coupon CRUD plus reporting for administrators.
#[derive(Clone)]
pub struct CouponInventory {
    coupons: Arc<dyn CouponStore>,
    claims: Arc<dyn ClaimLedger>,
    max_batch_size: usize,
}

impl CouponInventory {
    pub fn new(
        coupons: Arc<dyn CouponStore>,
        claims: Arc<dyn ClaimLedger>,
        max_batch_size: usize,
    ) -> Self {
        Self {
            coupons,
            claims,
            max_batch_size,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Coupon, InventoryError> {
        self.coupons
            .find_by_id(id)
            .await?
            .ok_or(InventoryError::NotFound)
    }

    /// All coupons, newest first.
    pub async fn list_all(&self) -> Result<Vec<Coupon>, InventoryError> {
        Ok(self.coupons.list_all().await?)
    }

    pub async fn create(&self, coupon: NewCoupon) -> Result<Coupon, InventoryError> {
        if !self
            .coupons
            .existing_codes(std::slice::from_ref(&coupon.code))
            .await?
            .is_empty()
        {
            return Err(InventoryError::CodeTaken(coupon.code));
        }

        let code = coupon.code.clone();
        let created = match self.coupons.insert_batch(vec![coupon], Utc::now()).await {
            Ok(mut created) => created.pop().ok_or_else(|| {
                StoreError::Internal("insert returned no coupon".to_string())
            })?,
            Err(StoreError::Conflict(_)) => return Err(InventoryError::CodeTaken(code)),
            Err(e) => return Err(e.into()),
        };

        info!(coupon_id = %created.id, code = %created.code, "Coupon created");
        Ok(created)
    }

    /// Creates every coupon in the batch or none of them.
    pub async fn create_bulk(&self, coupons: Vec<NewCoupon>) -> Result<Vec<Coupon>, InventoryError> {
        if coupons.is_empty() {
            return Err(InventoryError::EmptyBatch);
        }
        if coupons.len() > self.max_batch_size {
            return Err(InventoryError::BatchTooLarge {
                size: coupons.len(),
                max: self.max_batch_size,
            });
        }

        let duplicates = duplicate_codes(&coupons);
        if !duplicates.is_empty() {
            return Err(InventoryError::DuplicateInBatch(duplicates));
        }

        let codes: Vec<String> = coupons.iter().map(|c| c.code.clone()).collect();
        let existing = self.coupons.existing_codes(&codes).await?;
        if !existing.is_empty() {
            return Err(InventoryError::CodesExist(existing));
        }

        let created = match self.coupons.insert_batch(coupons, Utc::now()).await {
            Ok(created) => created,
            Err(StoreError::Conflict(_)) => {
                // Lost a race with a concurrent create.
                return Err(InventoryError::CodesExist(
                    self.coupons.existing_codes(&codes).await?,
                ));
            }
            Err(e) => return Err(e.into()),
        };

        info!(count = created.len(), "Coupons created in bulk");
        Ok(created)
    }

    /// Updates a coupon. Used coupons keep their code and stay active.
    pub async fn update(&self, id: Uuid, changes: CouponChanges) -> Result<Coupon, InventoryError> {
        if changes.is_empty() {
            return self.get(id).await;
        }

        if let Some(code) = &changes.code {
            if self.coupons.code_taken_by_other(code, id).await? {
                return Err(InventoryError::CodeTaken(code.clone()));
            }
        }

        match self.coupons.update_coupon(id, &changes).await {
            Ok(MutationOutcome::Applied(coupon)) => {
                info!(coupon_id = %id, "Coupon updated");
                Ok(coupon)
            }
            Ok(MutationOutcome::NotFound) => Err(InventoryError::NotFound),
            Ok(MutationOutcome::Frozen) => {
                let current = self.get(id).await?;
                Err(InventoryError::UsedCouponFrozen(
                    changes
                        .frozen_violation(&current)
                        .unwrap_or("Coupon has already been used"),
                ))
            }
            Err(StoreError::Conflict(_)) => Err(InventoryError::CodeTaken(
                changes.code.unwrap_or_default(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), InventoryError> {
        match self.coupons.delete_unused(id).await? {
            MutationOutcome::Applied(()) => {
                info!(coupon_id = %id, "Coupon deleted");
                Ok(())
            }
            MutationOutcome::NotFound => Err(InventoryError::NotFound),
            MutationOutcome::Frozen => Err(InventoryError::UsedCouponFrozen(
                "Cannot delete a used coupon",
            )),
        }
    }

    /// Flips the active flag of an unused coupon.
    pub async fn toggle(&self, id: Uuid) -> Result<Coupon, InventoryError> {
        match self.coupons.toggle_unused(id).await? {
            MutationOutcome::Applied(coupon) => {
                info!(coupon_id = %id, is_active = coupon.is_active, "Coupon toggled");
                Ok(coupon)
            }
            MutationOutcome::NotFound => Err(InventoryError::NotFound),
            MutationOutcome::Frozen => Err(InventoryError::UsedCouponFrozen(
                "Cannot change the status of a used coupon",
            )),
        }
    }

    /// Claim history, newest first. `None` returns everything.
    pub async fn claim_history(&self, limit: Option<i64>) -> Result<Vec<ClaimRecord>, InventoryError> {
        Ok(match limit {
            Some(limit) => self.claims.list_recent(limit).await?,
            None => self.claims.list_all().await?,
        })
    }

    pub async fn dashboard(&self) -> Result<DashboardStats, InventoryError> {
        self.dashboard_at(Utc::now()).await
    }

    pub async fn dashboard_at(&self, now: DateTime<Utc>) -> Result<DashboardStats, InventoryError> {
        let stats = self.coupons.stats(now).await?;
        let recent_claims = self.claims.list_recent(DASHBOARD_RECENT_CLAIMS).await?;

        Ok(DashboardStats {
            stats,
            recent_claims,
            generated_at: now,
        })
    }
}

/// Codes appearing more than once, in first-seen order.
fn duplicate_codes(coupons: &[NewCoupon]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut duplicates = Vec::new();
    for coupon in coupons {
        if !seen.insert(coupon.code.as_str()) && reported.insert(coupon.code.as_str()) {
            duplicates.push(coupon.code.clone());
        }
    }
    duplicates
}
