//! Per-contract maximum loss.
//!
//! Defined-risk structures lose at most their strike width. Undefined-risk
//! structures are bounded by a configured multiple of an at-the-money premium
//! proxy, `0.4 × S × σ × √T`, which is only used for sizing.

use chrono::NaiveDate;

use crate::config::RiskConfig;
use crate::domain::{MarketSnapshot, OrderIntent};
use crate::strategy::StrategyVariant;

/// Approximate at-the-money option premium for `days` calendar days.
pub fn atm_premium(price: f64, iv: f64, days: f64) -> f64 {
    if days <= 0.0 {
        return 0.0;
    }
    0.4 * price * iv * (days / 365.0).sqrt()
}

fn days_between(from: NaiveDate, to: NaiveDate) -> f64 {
    // Same-day expiry still carries a day of premium.
    ((to - from).num_days()).max(1) as f64
}

/// Maximum loss of one unit of the structure, in currency.
///
/// `None` for stubs and for structures whose risk cannot be bounded from the
/// snapshot (non-positive or non-finite result).
pub fn per_contract_risk(intent: &OrderIntent, snapshot: &MarketSnapshot, config: &RiskConfig) -> Option<f64> {
    let today = snapshot.timestamp.date_naive();
    let multiplier = config.contract_multiplier;
    let premium = |expiry: NaiveDate| atm_premium(snapshot.price, snapshot.iv, days_between(today, expiry));

    let risk = match intent.variant() {
        StrategyVariant::LongCall | StrategyVariant::LongPut => {
            premium(intent.nearest_expiry()) * config.worst_case_premium_multiple * multiplier
        }
        StrategyVariant::Straddle => {
            2.0 * premium(intent.nearest_expiry()) * config.worst_case_premium_multiple * multiplier
        }
        StrategyVariant::VerticalSpread
        | StrategyVariant::BullCallSpread
        | StrategyVariant::BearPutSpread
        | StrategyVariant::IronCondor
        | StrategyVariant::IronButterfly => intent.width() * multiplier,
        StrategyVariant::CalendarSpread => {
            let far = intent
                .legs()
                .iter()
                .map(|l| l.contract.expiry)
                .max()
                .unwrap_or_else(|| intent.nearest_expiry());
            (premium(far) - premium(intent.nearest_expiry())) * multiplier
        }
        StrategyVariant::Collar
        | StrategyVariant::CoveredCall
        | StrategyVariant::ProtectivePut
        | StrategyVariant::RatioBackspread => return None,
    };

    (risk.is_finite() && risk > 0.0).then_some(risk)
}
