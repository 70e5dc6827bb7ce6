//! Order submission: dry-run fills and bounded retry with backoff.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use optionlab_core::domain::Fill;
use optionlab_core::providers::{OrderSubmitter, SubmitError};
use optionlab_core::risk::RiskAdjustedOrder;

/// Fills every order at the reference price. Nothing leaves the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunSubmitter;

impl OrderSubmitter for DryRunSubmitter {
    fn submit(
        &self,
        order: &RiskAdjustedOrder,
        reference_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Fill, SubmitError> {
        if !(reference_price.is_finite() && reference_price > 0.0) {
            return Err(SubmitError::Rejected(format!("bad reference price {reference_price}")));
        }
        let legs: Vec<String> = order
            .intent
            .legs()
            .iter()
            .map(|leg| format!("{:?} {}", leg.side, leg.contract.occ_symbol()))
            .collect();
        info!(
            symbol = %order.symbol(),
            variant = %order.intent.variant(),
            contracts = order.position_size(),
            price = reference_price,
            legs = ?legs,
            "dry-run submit"
        );
        Ok(Fill::new(reference_price, timestamp))
    }
}

/// Retry settings for [`RetryingSubmitter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction of each delay drawn as random jitter, in [0, 1].
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.jitter,
        )
    }
}

/// Exponential delay schedule: `min(max, base * 2^attempt)` plus or minus jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: f64,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter: f64) -> Self {
        Self {
            base,
            max,
            jitter: jitter.clamp(0.0, 1.0),
            attempt: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let capped = self
            .base
            .saturating_mul(2u32.saturating_pow(self.attempt))
            .min(self.max);
        self.attempt = self.attempt.saturating_add(1);

        let spread = capped.as_secs_f64() * self.jitter;
        if spread <= 0.0 {
            return capped;
        }
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_secs_f64((capped.as_secs_f64() + offset).max(0.0))
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Wraps a submitter with bounded retries on transient failures.
///
/// Rejections are returned immediately.
pub struct RetryingSubmitter<S> {
    inner: S,
    policy: RetryPolicy,
    sleep: fn(Duration),
}

impl<S: OrderSubmitter> RetryingSubmitter<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            sleep: std::thread::sleep,
        }
    }

    /// Replace the sleep function, e.g. with a no-op in tests.
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: OrderSubmitter> OrderSubmitter for RetryingSubmitter<S> {
    fn submit(
        &self,
        order: &RiskAdjustedOrder,
        reference_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Fill, SubmitError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut backoff = self.policy.backoff();
        loop {
            match self.inner.submit(order, reference_price, timestamp) {
                Ok(fill) => return Ok(fill),
                Err(e) if e.is_retryable() && backoff.attempt() + 1 < attempts => {
                    let delay = backoff.next_delay();
                    warn!(
                        symbol = %order.symbol(),
                        attempt = backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient submit failure, retrying"
                    );
                    (self.sleep)(delay);
                }
                Err(e) => {
                    warn!(symbol = %order.symbol(), error = %e, "submit failed");
                    return Err(e);
                }
            }
        }
    }
}
