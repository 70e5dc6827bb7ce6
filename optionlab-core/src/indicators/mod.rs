//! Bar-derived indicators used to build market snapshots.
//!
//! Every indicator returns a series aligned with its input bars, NaN until
//! enough history exists.

pub mod atr;
pub mod metrics;
pub mod sma;

pub use atr::Atr;
pub use metrics::{snapshot_from_bars, BarMetricsProvider, MetricsParams};
pub use sma::Sma;

use crate::domain::Bar;

pub trait Indicator: Send + Sync {
    fn name(&self) -> &str;

    /// Bars needed before the first valid value.
    fn lookback(&self) -> usize;

    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Synthetic bars from closes: open = previous close, high/low ±1 around the body.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                symbol: "TEST".to_string(),
                timestamp: base + Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}
