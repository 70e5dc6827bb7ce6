//! One evaluation tick's worth of metrics for one symbol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metrics supplied per symbol and timestamp by a metrics provider.
///
/// `trend` is a signed strength (positive = up), `momentum` is signed in the
/// same sense. Any non-finite field makes the snapshot unusable for selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub iv: f64,
    pub trend: f64,
    pub momentum: f64,
    pub atr: f64,
}

impl MarketSnapshot {
    /// Name of the first field that is missing, non-finite or out of domain.
    pub fn invalid_field(&self) -> Option<&'static str> {
        if self.symbol.is_empty() {
            return Some("symbol");
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Some("price");
        }
        if !self.iv.is_finite() || self.iv < 0.0 {
            return Some("iv");
        }
        if !self.trend.is_finite() {
            return Some("trend");
        }
        if !self.momentum.is_finite() {
            return Some("momentum");
        }
        if !self.atr.is_finite() || self.atr < 0.0 {
            return Some("atr");
        }
        None
    }

    pub fn is_complete(&self) -> bool {
        self.invalid_field().is_none()
    }

    /// ATR normalised by price.
    pub fn normalized_atr(&self) -> f64 {
        self.atr / self.price
    }
}
