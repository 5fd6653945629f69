use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use domain::services::{ClaimError, InventoryError};
use domain::store::StoreError;
use serde::Serialize;
use shared::jwt::JwtError;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::services::auth::AuthError;

/// Message returned with every cooldown rejection.
pub const COOLDOWN_MESSAGE: &str = "You have already claimed a coupon recently";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation error: {message}")]
    InvalidFields {
        message: String,
        details: Vec<ValidationDetail>,
    },

    #[error("Cooldown active: {time_left}")]
    CooldownActive {
        time_left: String,
        next_eligible_date: DateTime<Utc>,
        retry_after_secs: i64,
    },

    #[error("Rate limit of {limit_per_minute} requests/minute exceeded")]
    RateLimited {
        limit_per_minute: u32,
        retry_after_secs: u64,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_left: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_eligible_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<i64>,
}

impl ErrorBody {
    fn new(error: &str, message: String) -> Self {
        Self {
            error: error.into(),
            message,
            details: None,
            time_left: None,
            next_eligible_date: None,
            retry_after_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl ApiError {
    /// Stable machine-readable code placed in the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Validation(_) | ApiError::InvalidFields { .. } => "validation_error",
            ApiError::CooldownActive { .. } => "cooldown_active",
            ApiError::RateLimited { .. } => "rate_limit_exceeded",
            ApiError::Internal(_) => "internal_error",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) | ApiError::InvalidFields { .. } => StatusCode::BAD_REQUEST,
            ApiError::CooldownActive { .. } | ApiError::RateLimited { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let mut retry_after = None;

        let body = match self {
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Validation(msg)
            | ApiError::ServiceUnavailable(msg) => ErrorBody::new(code, msg),
            ApiError::InvalidFields { message, details } => ErrorBody {
                details: Some(details),
                ..ErrorBody::new(code, message)
            },
            ApiError::CooldownActive {
                time_left,
                next_eligible_date,
                retry_after_secs,
            } => {
                retry_after = Some(retry_after_secs.to_string());
                ErrorBody {
                    time_left: Some(time_left),
                    next_eligible_date: Some(next_eligible_date),
                    retry_after_secs: Some(retry_after_secs),
                    ..ErrorBody::new(code, COOLDOWN_MESSAGE.to_string())
                }
            }
            ApiError::RateLimited {
                limit_per_minute,
                retry_after_secs,
            } => {
                retry_after = Some(retry_after_secs.to_string());
                ErrorBody {
                    retry_after_secs: i64::try_from(retry_after_secs).ok(),
                    ..ErrorBody::new(
                        code,
                        format!("Rate limit of {} requests/minute exceeded", limit_per_minute),
                    )
                }
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ErrorBody::new(code, "An internal error occurred".into())
            }
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => {
                tracing::warn!(error = %msg, "Store unavailable");
                ApiError::ServiceUnavailable("Storage is temporarily unavailable".into())
            }
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::Internal(msg) => ApiError::Internal(format!("Store error: {}", msg)),
        }
    }
}

impl From<ClaimError> for ApiError {
    fn from(err: ClaimError) -> Self {
        match err {
            ClaimError::RateLimited(block) => ApiError::CooldownActive {
                time_left: block.time_left_label(),
                next_eligible_date: block.next_eligible_at,
                retry_after_secs: block.retry_after_secs(Utc::now()),
            },
            ClaimError::NotFound => ApiError::NotFound("Coupon not found".into()),
            ClaimError::Inactive => ApiError::Validation("This coupon is not active".into()),
            ClaimError::AlreadyClaimed => {
                ApiError::Conflict("This coupon has already been claimed".into())
            }
            ClaimError::Expired => ApiError::Validation("This coupon has expired".into()),
            ClaimError::NoneAvailable => {
                ApiError::NotFound("No coupons available at the moment".into())
            }
            ClaimError::Store(e) => e.into(),
        }
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::NotFound => ApiError::NotFound("Coupon not found".into()),
            InventoryError::EmptyBatch | InventoryError::BatchTooLarge { .. } => {
                ApiError::Validation(err.to_string())
            }
            InventoryError::DuplicateInBatch(_)
            | InventoryError::CodesExist(_)
            | InventoryError::CodeTaken(_)
            | InventoryError::UsedCouponFrozen(_) => ApiError::Conflict(err.to_string()),
            InventoryError::Store(e) => e.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::RegistrationDisabled => {
                ApiError::Forbidden("Admin registration is disabled".into())
            }
            AuthError::EmailAlreadyExists => {
                ApiError::Conflict("Email already registered".into())
            }
            AuthError::WeakPassword(msg) => ApiError::Validation(msg),
            AuthError::InvalidCredentials => ApiError::Unauthorized("Invalid credentials".into()),
            AuthError::AdminNotFound => ApiError::NotFound("Admin not found".into()),
            AuthError::TokenError(e) => ApiError::Internal(format!("Token error: {}", e)),
            AuthError::PasswordError(e) => ApiError::Internal(format!("Password error: {}", e)),
            AuthError::Store(e) => e.into(),
            AuthError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::TokenExpired => ApiError::Unauthorized("Token has expired".into()),
            JwtError::EncodingError(_) | JwtError::InvalidKey(_) => {
                ApiError::Internal(err.to_string())
            }
            JwtError::DecodingError(_) | JwtError::InvalidToken => {
                ApiError::Unauthorized("Invalid or expired token".into())
            }
        }
    }
}

fn collect_details(prefix: &str, errors: &ValidationErrors, out: &mut Vec<ValidationDetail>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(errors) => {
                out.extend(errors.iter().map(|e| ValidationDetail {
                    field: path.clone(),
                    message: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid ({})", path, e.code)),
                }));
            }
            ValidationErrorsKind::Struct(nested) => collect_details(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_details(&format!("{}[{}]", path, index), nested, out);
                }
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details = Vec::new();
        collect_details("", &errors, &mut details);
        details.sort_by(|a, b| a.field.cmp(&b.field));

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::InvalidFields { message, details }
    }
}
