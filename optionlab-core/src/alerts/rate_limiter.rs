//! Fixed-window alert limiter, one budget per notifier channel.
//!
//! Check-and-increment happens under a single lock, so concurrent trade
//! events sharing a channel can never push a window past its maximum.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AlertConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertBudget {
    pub window_start: DateTime<Utc>,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertDecision {
    Allowed,
    BelowMinNotional,
    RateLimited,
}

impl AlertDecision {
    pub fn is_allowed(self) -> bool {
        self == AlertDecision::Allowed
    }
}

#[derive(Debug)]
pub struct AlertRateLimiter {
    min_notional: f64,
    max_per_window: u32,
    window: Duration,
    budgets: Mutex<HashMap<String, AlertBudget>>,
}

impl AlertRateLimiter {
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            min_notional: config.min_notional,
            max_per_window: config.max_per_window,
            window: Duration::seconds(config.window_secs.min(u32::MAX as u64) as i64),
            budgets: Mutex::new(HashMap::new()),
        }
    }

    /// Decide whether an alert may go out on `channel`, consuming budget if so.
    pub fn check(&self, channel: &str, notional: f64, timestamp: DateTime<Utc>) -> AlertDecision {
        let mut budgets = self.budgets.lock().unwrap_or_else(PoisonError::into_inner);
        let budget = budgets.entry(channel.to_string()).or_insert(AlertBudget {
            window_start: timestamp,
            count: 0,
        });
        if timestamp - budget.window_start >= self.window {
            budget.window_start = timestamp;
            budget.count = 0;
        }

        let decision = if notional.is_nan() || notional < self.min_notional {
            AlertDecision::BelowMinNotional
        } else if budget.count >= self.max_per_window {
            AlertDecision::RateLimited
        } else {
            budget.count += 1;
            AlertDecision::Allowed
        };
        if !decision.is_allowed() {
            debug!(channel, notional, outcome = ?decision, "alert suppressed");
        }
        decision
    }

    pub fn allow(&self, channel: &str, notional: f64, timestamp: DateTime<Utc>) -> bool {
        self.check(channel, notional, timestamp).is_allowed()
    }

    /// Current budget for `channel`, if it has seen any alert.
    pub fn budget(&self, channel: &str) -> Option<AlertBudget> {
        let budgets = self.budgets.lock().unwrap_or_else(PoisonError::into_inner);
        budgets.get(channel).copied()
    }
}
