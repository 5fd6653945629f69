//! Rate limiting middleware.
//!
//! Throttles the public claim routes per client IP with a GCRA quota. This
//! is request throttling only; the one-coupon-per-window rule lives in the
//! claim cooldown.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use std::num::NonZeroU32;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::claimant::client_ip;

const FALLBACK_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(60) {
    Some(n) => n,
    None => unreachable!(),
};

/// Rate limiter state shared across all requests, keyed by client IP.
pub struct RateLimiterState {
    limiter: DefaultKeyedRateLimiter<String>,
    rate_limit_per_minute: u32,
}

impl RateLimiterState {
    /// Create a new rate limiter state with the specified limit per minute.
    /// Zero falls back to 60.
    pub fn new(rate_limit_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(rate_limit_per_minute).unwrap_or(FALLBACK_PER_MINUTE);
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(per_minute)),
            rate_limit_per_minute: per_minute.get(),
        }
    }

    pub fn rate_limit_per_minute(&self) -> u32 {
        self.rate_limit_per_minute
    }

    /// Check if a request from the given client should be allowed.
    /// Returns Ok(()) if allowed, or Err with retry_after seconds if rate limited.
    pub fn check(&self, client: &str) -> Result<(), u64> {
        match self.limiter.check_key(&client.to_string()) {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let wait_time = not_until.wait_time_from(DefaultClock::default().now());
                Err(wait_time.as_secs().max(1))
            }
        }
    }

    /// Drops state for clients whose quota has fully replenished.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}

/// Middleware that applies rate limiting per client IP.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(ref rate_limiter) = state.rate_limiter {
        let ip = client_ip(
            req.headers(),
            req.extensions(),
            state.config.security.trust_proxy_headers,
        );
        if let Err(retry_after) = rate_limiter.check(&ip) {
            tracing::debug!(ip = %ip, retry_after, "Request throttled");
            return ApiError::RateLimited {
                limit_per_minute: rate_limiter.rate_limit_per_minute(),
                retry_after_secs: retry_after,
            }
            .into_response();
        }
    }

    next.run(req).await
}
