//! Claim ledger models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The identity a claim is attributed to.
///
/// Cooldown matching is an OR across `ip_address` and `session_id`: a prior
/// claim from either one blocks the requester.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Claimant {
    pub ip_address: String,
    pub session_id: String,
    pub user_agent: Option<String>,
}

impl Claimant {
    pub fn new(ip_address: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            session_id: session_id.into(),
            user_agent: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Lock keys for serialising allocations per identity, sorted so that
    /// two claimants sharing one key always acquire them in the same order.
    pub fn lock_keys(&self) -> Vec<String> {
        let mut keys = vec![
            format!("ip:{}", self.ip_address),
            format!("session:{}", self.session_id),
        ];
        keys.sort();
        keys
    }
}

/// An append-only record of a successful claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: Uuid,
    pub coupon_id: Uuid,
    pub ip_address: String,
    pub session_id: String,
    pub user_agent: Option<String>,
    pub claimed_at: DateTime<Utc>,
}

/// Input for appending a claim.
#[derive(Debug, Clone)]
pub struct NewClaim {
    pub coupon_id: Uuid,
    pub claimant: Claimant,
    pub claimed_at: DateTime<Utc>,
}

impl NewClaim {
    pub fn into_claim(self, id: Uuid) -> Claim {
        Claim {
            id,
            coupon_id: self.coupon_id,
            ip_address: self.claimant.ip_address,
            session_id: self.claimant.session_id,
            user_agent: self.claimant.user_agent,
            claimed_at: self.claimed_at,
        }
    }
}

/// Coupon fields shown alongside a claim in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimCouponInfo {
    pub id: Uuid,
    pub code: String,
    pub description: String,
}

/// A claim joined with its coupon for administrator views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRecord {
    pub id: Uuid,
    /// `None` if the coupon no longer exists.
    pub coupon: Option<ClaimCouponInfo>,
    pub ip_address: String,
    pub session_id: String,
    pub user_agent: Option<String>,
    pub claimed_at: DateTime<Utc>,
}
