//! MarketSnapshot from bar history.
//!
//! - iv: annualised stdev of log close returns (×√252)
//! - atr: Wilder ATR
//! - trend: tanh((close − SMA) / ATR)
//! - momentum: tanh((close − close[n−k]) / ATR)

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Atr, Indicator, Sma};
use crate::domain::{Bar, MarketSnapshot};
use crate::providers::{MetricsProvider, ProviderError};

const TRADING_DAYS: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsParams {
    pub atr_period: usize,
    pub sma_period: usize,
    pub momentum_period: usize,
    pub volatility_lookback: usize,
}

impl Default for MetricsParams {
    fn default() -> Self {
        Self {
            atr_period: 14,
            sma_period: 20,
            momentum_period: 5,
            volatility_lookback: 20,
        }
    }
}

impl MetricsParams {
    /// Bars required before a snapshot can be computed.
    pub fn warmup(&self) -> usize {
        (self.atr_period + 1)
            .max(self.sma_period)
            .max(self.momentum_period + 1)
            .max(self.volatility_lookback + 1)
    }
}

fn unavailable(symbol: &str, reason: impl Into<String>) -> ProviderError {
    ProviderError::Unavailable {
        symbol: symbol.to_string(),
        reason: reason.into(),
    }
}

fn realized_volatility(closes: &[f64]) -> f64 {
    let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    let n = returns.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = returns.iter().sum::<f64>() / n as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt() * TRADING_DAYS.sqrt()
}

/// Snapshot as of the last bar in `bars`.
pub fn snapshot_from_bars(bars: &[Bar], params: &MetricsParams) -> Result<MarketSnapshot, ProviderError> {
    let Some(last) = bars.last() else {
        return Err(unavailable("", "no bars"));
    };
    let symbol = last.symbol.as_str();
    if bars.len() < params.warmup() {
        return Err(unavailable(
            symbol,
            format!("{} bars, need {}", bars.len(), params.warmup()),
        ));
    }
    if bars.iter().any(|b| b.is_void()) {
        return Err(unavailable(symbol, "void bar in history"));
    }

    let close = last.close;
    let atr = Atr::new(params.atr_period)
        .latest(bars)
        .ok_or_else(|| unavailable(symbol, "atr undefined"))?;
    let sma = Sma::new(params.sma_period)
        .compute(bars)
        .last()
        .copied()
        .filter(|v| v.is_finite())
        .ok_or_else(|| unavailable(symbol, "sma undefined"))?;
    let past = bars[bars.len() - 1 - params.momentum_period].close;

    let closes: Vec<f64> = bars[bars.len() - 1 - params.volatility_lookback..]
        .iter()
        .map(|b| b.close)
        .collect();
    let iv = realized_volatility(&closes);

    let (trend, momentum) = if atr > 0.0 {
        (((close - sma) / atr).tanh(), ((close - past) / atr).tanh())
    } else {
        (0.0, 0.0)
    };

    let snapshot = MarketSnapshot {
        symbol: symbol.to_string(),
        timestamp: last.timestamp,
        price: close,
        iv,
        trend,
        momentum,
        atr,
    };
    match snapshot.invalid_field() {
        Some(field) => Err(unavailable(symbol, format!("invalid {field}"))),
        None => Ok(snapshot),
    }
}

/// Metrics provider over an in-memory bar history per symbol.
#[derive(Debug, Clone, Default)]
pub struct BarMetricsProvider {
    history: HashMap<String, Vec<Bar>>,
    params: MetricsParams,
}

impl BarMetricsProvider {
    pub fn new(params: MetricsParams) -> Self {
        Self {
            history: HashMap::new(),
            params,
        }
    }

    /// Replace a symbol's history. Bars are sorted by timestamp.
    pub fn insert(&mut self, symbol: impl Into<String>, mut bars: Vec<Bar>) {
        bars.sort_by_key(|b| b.timestamp);
        self.history.insert(symbol.into(), bars);
    }
}

impl MetricsProvider for BarMetricsProvider {
    fn get_snapshot(&self, symbol: &str, timestamp: DateTime<Utc>) -> Result<MarketSnapshot, ProviderError> {
        let bars = self
            .history
            .get(symbol)
            .ok_or_else(|| unavailable(symbol, "unknown symbol"))?;
        let end = bars.partition_point(|b| b.timestamp <= timestamp);
        snapshot_from_bars(&bars[..end], &self.params)
    }
}
