//! Claim cooldown evaluation.
//!
//! An identity (IP address or session id) may claim one coupon per window.
//! A prior claim blocks the identity while `claimed_at > now - window`; a
//! claim exactly one window old no longer blocks.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::models::{Claim, Claimant};
use crate::store::{ClaimLedger, StoreError};

/// Default cooldown window in hours.
pub const DEFAULT_COOLDOWN_HOURS: i64 = 24;

/// Details of an active cooldown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownBlock {
    pub last_claimed_at: DateTime<Utc>,
    pub next_eligible_at: DateTime<Utc>,
    /// Time left, rounded up to a whole hour.
    pub remaining: Duration,
}

impl CooldownBlock {
    pub fn remaining_hours(&self) -> i64 {
        self.remaining.num_hours()
    }

    /// Human-readable wait, e.g. `"5 hours"`.
    pub fn time_left_label(&self) -> String {
        format!("{} hours", self.remaining_hours())
    }

    /// Exact seconds until the identity may claim again, for `Retry-After`.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.next_eligible_at - now).num_seconds().max(1)
    }
}

/// Whether an identity may claim right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CooldownStatus {
    Clear,
    Blocked(CooldownBlock),
}

impl CooldownStatus {
    pub fn is_clear(&self) -> bool {
        matches!(self, CooldownStatus::Clear)
    }
}

/// Rounds a positive duration up to the next whole hour.
fn ceil_to_hour(duration: Duration) -> Duration {
    let secs = duration.num_seconds();
    let sub_second = duration - Duration::seconds(secs) > Duration::zero();
    let secs = secs + i64::from(sub_second);
    Duration::hours((secs + 3599) / 3600)
}

/// Evaluates the most recent claim of an identity against the window.
pub fn evaluate(recent: Option<&Claim>, now: DateTime<Utc>, window: Duration) -> CooldownStatus {
    let Some(claim) = recent else {
        return CooldownStatus::Clear;
    };

    let next_eligible_at = claim.claimed_at + window;
    let exact = next_eligible_at - now;
    if exact <= Duration::zero() {
        return CooldownStatus::Clear;
    }

    CooldownStatus::Blocked(CooldownBlock {
        last_claimed_at: claim.claimed_at,
        next_eligible_at,
        remaining: ceil_to_hour(exact),
    })
}

/// Checks claimants against the claim ledger.
#[derive(Clone)]
pub struct CooldownChecker {
    ledger: Arc<dyn ClaimLedger>,
    window: Duration,
}

impl CooldownChecker {
    pub fn new(ledger: Arc<dyn ClaimLedger>, window: Duration) -> Self {
        Self { ledger, window }
    }

    /// Start of the window ending at `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    pub async fn check(&self, claimant: &Claimant) -> Result<CooldownStatus, StoreError> {
        self.check_at(claimant, Utc::now()).await
    }

    pub async fn check_at(
        &self,
        claimant: &Claimant,
        now: DateTime<Utc>,
    ) -> Result<CooldownStatus, StoreError> {
        let recent = self
            .ledger
            .find_recent_by_identity(
                &claimant.ip_address,
                &claimant.session_id,
                self.window_start(now),
            )
            .await?;

        Ok(evaluate(recent.as_ref(), now, self.window))
    }
}
