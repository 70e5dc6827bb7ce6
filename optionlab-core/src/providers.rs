//! Narrow interfaces to the collaborators around the core.
//!
//! Implementations of the I/O-bound traits live in the runner. The core only
//! consumes their results as plain values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Fill, MarketSnapshot};
use crate::risk::RiskAdjustedOrder;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("no snapshot for {symbol}: {reason}")]
    Unavailable { symbol: String, reason: String },
}

pub trait MetricsProvider: Send + Sync {
    fn get_snapshot(&self, symbol: &str, timestamp: DateTime<Utc>) -> Result<MarketSnapshot, ProviderError>;
}

/// Inputs to the confidence model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub iv: f64,
    pub trend: f64,
    pub momentum: f64,
    pub price: f64,
    pub days_to_expiry: f64,
}

impl Features {
    pub const LEN: usize = 5;

    pub fn from_snapshot(snapshot: &MarketSnapshot, days_to_expiry: f64) -> Self {
        Self {
            iv: snapshot.iv,
            trend: snapshot.trend,
            momentum: snapshot.momentum,
            price: snapshot.price,
            days_to_expiry,
        }
    }

    pub fn as_array(&self) -> [f64; Self::LEN] {
        [self.iv, self.trend, self.momentum, self.price, self.days_to_expiry]
    }
}

/// Probability that a trade is favorable.
///
/// `None` means no model is loaded; the gate then treats ML as disabled.
pub trait MlProvider: Send + Sync {
    fn predict_proba(&self, features: &Features) -> Option<f64>;
}

pub trait NewsProvider: Send + Sync {
    fn is_blocked(&self, symbol: &str, timestamp: DateTime<Utc>) -> bool;
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    /// Broker refused the order. Not retried.
    #[error("order rejected: {0}")]
    Rejected(String),
    /// Temporary failure. Safe to retry.
    #[error("transient submit failure: {0}")]
    Transient(String),
}

impl SubmitError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmitError::Transient(_))
    }
}

pub trait OrderSubmitter: Send + Sync {
    fn submit(
        &self,
        order: &RiskAdjustedOrder,
        reference_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Fill, SubmitError>;
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("notifier channel '{channel}' failed: {reason}")]
pub struct NotifyError {
    pub channel: String,
    pub reason: String,
}

pub trait Notifier: Send + Sync {
    fn send(&self, channel: &str, message: &str) -> Result<(), NotifyError>;
}

/// ML provider with no model loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoModel;

impl MlProvider for NoModel {
    fn predict_proba(&self, _features: &Features) -> Option<f64> {
        None
    }
}

/// News provider that never blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNews;

impl NewsProvider for NoNews {
    fn is_blocked(&self, _symbol: &str, _timestamp: DateTime<Utc>) -> bool {
        false
    }
}
