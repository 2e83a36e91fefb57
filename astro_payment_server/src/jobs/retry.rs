//! Bounded retry with exponential backoff and jitter for the outbound calls product jobs make.

use std::{future::Future, time::Duration};

use astrocalc_tools::AstroCalcApiError;
use chrono::Utc;
use log::*;
use rand::{thread_rng, Rng};

pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 8_000;

/// Retry budget and pacing for one outbound HTTP call.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts, ..Default::default() }
    }

    /// Delay before the next try once `attempt` attempts have failed: doubling growth capped at
    /// the maximum, plus up to 25% random jitter so synchronized workers spread out.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self.initial_backoff_ms.saturating_mul(1u64 << exp).min(self.max_backoff_ms);
        let jitter = thread_rng().gen_range(0..=base / 4);
        Duration::from_millis(base + jitter)
    }
}

/// The result of a retried call: the final outcome plus the attempt count and total elapsed
/// milliseconds, shaped for the job metrics columns.
#[derive(Debug)]
pub struct CallOutcome<T> {
    pub result: Result<T, AstroCalcApiError>,
    pub attempts: u32,
    pub elapsed_ms: i64,
}

/// Runs `call` until it succeeds, fails non-transiently, or exhausts the attempt budget. Only
/// timeouts and 429/502/503/504 responses are retried; the first non-transient failure is final.
pub async fn call_with_retry<T, F, Fut>(policy: RetryPolicy, mut call: F) -> CallOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AstroCalcApiError>>,
{
    let started = Utc::now();
    let mut attempts = 0u32;
    let result = loop {
        attempts += 1;
        match call().await {
            Ok(value) => break Ok(value),
            Err(e) if e.is_transient() && attempts < policy.max_attempts => {
                let delay = policy.backoff_delay(attempts);
                debug!(
                    "⚙️ Transient failure on attempt {attempts}/{}: {e}. Retrying in {}ms.",
                    policy.max_attempts,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            },
            Err(e) => break Err(e),
        }
    };
    let elapsed_ms = (Utc::now() - started).num_milliseconds();
    CallOutcome { result, attempts, elapsed_ms }
}
