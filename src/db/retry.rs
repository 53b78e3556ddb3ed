// src/db/retry.rs
// DOCUMENTATION: Bounded exponential backoff for units of work
// PURPOSE: Retry work that failed on a transient pool fault before giving up

use crate::errors::PoolError;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (0-based): doubles each time, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Run `unit` until it succeeds, fails permanently, or retries run out
/// DOCUMENTATION: Only errors classified as a PoolFault are retried; the unit acquires
/// its own connection on each attempt so a lost connection is never reused
pub async fn with_backoff<T, F, Fut>(policy: &BackoffPolicy, mut unit: F) -> Result<T, PoolError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PoolError>>,
{
    let mut attempt = 0;
    loop {
        let err = match unit().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match err.fault() {
            Some(fault) if attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                log::warn!(
                    "Transient database fault [{}], retrying in {} ms ({}/{})",
                    fault.code(),
                    delay.as_millis(),
                    attempt + 1,
                    policy.max_retries
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            _ => return Err(err),
        }
    }
}
