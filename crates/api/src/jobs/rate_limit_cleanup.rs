//! Background job that drops idle request throttling state.

use std::sync::Arc;

use tracing::debug;

use super::scheduler::{Job, JobError, JobFrequency};
use crate::middleware::RateLimiterState;

/// Forgets clients whose request quota has fully replenished, so the keyed
/// limiter does not grow with every IP ever seen.
pub struct RateLimitCleanupJob {
    limiter: Arc<RateLimiterState>,
}

impl RateLimitCleanupJob {
    pub fn new(limiter: Arc<RateLimiterState>) -> Self {
        Self { limiter }
    }
}

#[async_trait::async_trait]
impl Job for RateLimitCleanupJob {
    fn name(&self) -> &'static str {
        "rate_limit_cleanup"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(5)
    }

    async fn execute(&self) -> Result<(), JobError> {
        let before = self.limiter.tracked_clients();
        self.limiter.retain_recent();
        let after = self.limiter.tracked_clients();

        metrics::gauge!("rate_limiter_tracked_clients").set(after as f64);
        debug!(before, after, "Pruned rate limiter state");
        Ok(())
    }
}
