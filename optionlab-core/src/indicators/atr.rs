//! Average True Range with Wilder smoothing (alpha = 1/period).
//!
//! TR[t] = max(high−low, |high−close[t−1]|, |low−close[t−1]|). The first bar
//! has no previous close, so the seed is the mean of TR[1..=period].

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }

    /// Most recent ATR value, if defined.
    pub fn latest(&self, bars: &[Bar]) -> Option<f64> {
        self.compute(bars).last().copied().filter(|v| v.is_finite())
    }
}

/// True range per bar; index 0 is NaN.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = vec![f64::NAN; bars.len()];
    for (i, pair) in bars.windows(2).enumerate() {
        let (prev, cur) = (&pair[0], &pair[1]);
        tr[i + 1] = (cur.high - cur.low)
            .max((cur.high - prev.close).abs())
            .max((cur.low - prev.close).abs());
    }
    tr
}

/// Wilder smoothing seeded by the mean of the first `period` values after
/// the leading NaN. A NaN after the seed invalidates the rest of the series.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    let Some(start) = values.iter().position(|v| !v.is_nan()) else {
        return out;
    };
    let seed_end = start + period;
    if period == 0 || seed_end > n {
        return out;
    }
    let window = &values[start..seed_end];
    if window.iter().any(|v| v.is_nan()) {
        return out;
    }
    let mut prev = window.iter().sum::<f64>() / period as f64;
    out[seed_end - 1] = prev;

    let alpha = 1.0 / period as f64;
    for i in seed_end..n {
        if values[i].is_nan() {
            break;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        out[i] = prev;
    }
    out
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        wilder_smooth(&true_range(bars), self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;
    use chrono::{Duration, TimeZone, Utc};

    fn ohlc(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        let base = Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap();
        data.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                symbol: "TEST".into(),
                timestamp: base + Duration::days(i as i64),
                open,
                high,
                low,
                close,
                volume: 0.0,
            })
            .collect()
    }

    #[test]
    fn true_range_uses_previous_close() {
        let bars = ohlc(&[
            (98.0, 102.0, 97.0, 100.0),
            (110.0, 115.0, 108.0, 112.0), // gap: |115-100| = 15
        ]);
        let tr = true_range(&bars);
        assert!(tr[0].is_nan());
        assert_approx(tr[1], 15.0, 1e-12);
    }

    #[test]
    fn atr_period_3() {
        let bars = ohlc(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0), // TR 8
            (106.0, 107.0, 98.0, 99.0),   // TR 9
            (99.0, 103.0, 97.0, 101.0),   // TR 6
            (101.0, 106.0, 100.0, 105.0), // TR 6
        ]);
        let atr = Atr::new(3).compute(&bars);
        assert!(atr[2].is_nan());
        assert_approx(atr[3], 23.0 / 3.0, 1e-12);
        assert_approx(atr[4], 64.0 / 9.0, 1e-12);
        assert_approx(Atr::new(3).latest(&bars).unwrap(), 64.0 / 9.0, 1e-12);
    }

    #[test]
    fn insufficient_history_has_no_latest() {
        let bars = ohlc(&[(100.0, 101.0, 99.0, 100.0), (100.0, 101.0, 99.0, 100.0)]);
        assert_eq!(Atr::new(14).latest(&bars), None);
    }
}
