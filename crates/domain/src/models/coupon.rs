//! Coupon domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

lazy_static::lazy_static! {
    static ref COUPON_CODE_REGEX: regex::Regex =
        regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{2,63}$").unwrap();
}

/// A single-use coupon in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub description: String,
    pub is_active: bool,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Why a coupon cannot be handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    Inactive,
    Used,
    Expired,
}

impl Coupon {
    /// A coupon with an expiry at or before `now` is expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Checks claimability in the order inactive, used, expired.
    pub fn check_claimable_at(&self, now: DateTime<Utc>) -> Result<(), Ineligibility> {
        if !self.is_active {
            return Err(Ineligibility::Inactive);
        }
        if self.is_used {
            return Err(Ineligibility::Used);
        }
        if self.is_expired_at(now) {
            return Err(Ineligibility::Expired);
        }
        Ok(())
    }

    pub fn is_claimable_at(&self, now: DateTime<Utc>) -> bool {
        self.check_claimable_at(now).is_ok()
    }

    pub fn to_public(&self) -> PublicCoupon {
        PublicCoupon {
            id: self.id,
            code: self.code.clone(),
            description: self.description.clone(),
        }
    }
}

/// Coupon fields visible to end users while browsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCoupon {
    pub id: Uuid,
    pub code: String,
    pub description: String,
}

/// What a successful claim hands back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimedCoupon {
    pub code: String,
    pub description: String,
    #[serde(skip_serializing)]
    pub claimed_at: DateTime<Utc>,
}

/// Input for inserting a coupon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCoupon {
    pub code: String,
    pub description: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Requested changes to an existing coupon. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CouponChanges {
    pub code: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CouponChanges {
    pub fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.description.is_none()
            && self.is_active.is_none()
            && self.expires_at.is_none()
    }

    /// Returns the reason the change is refused for a used coupon, if any.
    pub fn frozen_violation(&self, current: &Coupon) -> Option<&'static str> {
        if !current.is_used {
            return None;
        }
        if self.code.as_deref().is_some_and(|code| code != current.code) {
            return Some("Cannot change the code of a used coupon");
        }
        if self.is_active == Some(false) {
            return Some("Cannot deactivate a used coupon");
        }
        None
    }

    /// Applies the changes onto a coupon.
    pub fn apply_to(&self, coupon: &mut Coupon) {
        if let Some(code) = &self.code {
            coupon.code = code.clone();
        }
        if let Some(description) = &self.description {
            coupon.description = description.clone();
        }
        if let Some(is_active) = self.is_active {
            coupon.is_active = is_active;
        }
        if let Some(expires_at) = self.expires_at {
            coupon.expires_at = Some(expires_at);
        }
    }
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Request payload for creating a coupon.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponRequest {
    #[validate(regex(
        path = *COUPON_CODE_REGEX,
        message = "code must be 3-64 characters of letters, digits, '-' or '_'"
    ))]
    pub code: String,

    #[validate(length(min = 1, max = 500, message = "description must be 1-500 characters"))]
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub description: String,

    pub expires_at: Option<DateTime<Utc>>,
}

impl From<CreateCouponRequest> for NewCoupon {
    fn from(request: CreateCouponRequest) -> Self {
        Self {
            code: request.code.trim().to_string(),
            description: request.description.trim().to_string(),
            expires_at: request.expires_at,
        }
    }
}

/// Request payload for creating many coupons at once.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateCouponsRequest {
    #[validate(length(min = 1, message = "coupons must not be empty"))]
    #[validate(nested)]
    pub coupons: Vec<CreateCouponRequest>,
}

/// Request payload for updating a coupon.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCouponRequest {
    #[validate(regex(
        path = *COUPON_CODE_REGEX,
        message = "code must be 3-64 characters of letters, digits, '-' or '_'"
    ))]
    pub code: Option<String>,

    #[validate(length(min = 1, max = 500, message = "description must be 1-500 characters"))]
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub description: Option<String>,

    pub is_active: Option<bool>,

    pub expires_at: Option<DateTime<Utc>>,
}

impl From<UpdateCouponRequest> for CouponChanges {
    fn from(request: UpdateCouponRequest) -> Self {
        Self {
            code: request.code.map(|c| c.trim().to_string()),
            description: request.description.map(|d| d.trim().to_string()),
            is_active: request.is_active,
            expires_at: request.expires_at,
        }
    }
}
