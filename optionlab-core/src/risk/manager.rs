//! Position sizing and stop/target placement.
//!
//! # Sizing
//! ```text
//! base  = floor(equity × risk_fraction / per_contract_risk)
//! natr  = ATR / price
//! size  = floor(base × ceiling / natr)   if natr > ceiling, else base
//! size  = min(size, max_contracts_per_symbol)
//! ```
//! The volatility floor only ever shrinks size.

use tracing::debug;

use crate::config::RiskConfig;
use crate::domain::{Exposure, MarketSnapshot, OrderIntent};
use crate::risk::params::{RiskAdjustedOrder, RiskParams, TrailingStop};
use crate::risk::premium::per_contract_risk;

/// Contract count for a per-contract risk. Zero when the inputs are degenerate.
pub fn size_contracts(
    account_equity: f64,
    per_contract_risk: f64,
    normalized_atr: f64,
    config: &RiskConfig,
) -> u32 {
    if !(account_equity.is_finite() && account_equity > 0.0) {
        return 0;
    }
    if !(per_contract_risk.is_finite() && per_contract_risk > 0.0) {
        return 0;
    }
    let mut size = (account_equity * config.risk_fraction / per_contract_risk).floor();
    if normalized_atr.is_finite() && normalized_atr > config.volatility_ceiling {
        size = (size * config.volatility_ceiling / normalized_atr).floor();
    }
    if !size.is_finite() || size <= 0.0 {
        return 0;
    }
    (size.min(config.max_contracts_per_symbol as f64)) as u32
}

/// Stop and target prices around `reference` for an exposure.
///
/// Delta exposures mirror around the reference. Volatility exposures report
/// the lower stop edge and the upper target edge of symmetric bands.
pub fn bracket(exposure: Exposure, reference: f64, atr: f64, config: &RiskConfig) -> (f64, f64) {
    let stop_distance = atr * config.stop_atr_multiplier;
    let target_distance = atr * config.target_atr_multiplier;
    match exposure {
        Exposure::ShortDelta => (reference + stop_distance, reference - target_distance),
        Exposure::LongDelta | Exposure::LongVolatility | Exposure::ShortVolatility => {
            (reference - stop_distance, reference + target_distance)
        }
    }
}

/// Size and bound `intent` against a fresh snapshot.
///
/// Never fails: when per-contract risk cannot be computed the order comes
/// back with `position_size == 0`.
pub fn adjust(
    intent: OrderIntent,
    snapshot: &MarketSnapshot,
    account_equity: f64,
    config: &RiskConfig,
) -> RiskAdjustedOrder {
    let exposure = intent.exposure();
    let reference = snapshot.price;
    let (stop_loss_price, take_profit_price) = bracket(exposure, reference, snapshot.atr, config);

    let trailing = match (exposure.delta_sign(), config.trailing_stop_pct) {
        (Some(_), Some(trail_pct)) => Some(TrailingStop {
            activation_pct: config.trailing_activation_pct,
            trail_pct,
        }),
        _ => None,
    };

    let risk = if snapshot.is_complete() {
        per_contract_risk(&intent, snapshot, config)
    } else {
        None
    };
    let (position_size, max_risk_amount) = match risk {
        Some(r) => {
            let size = size_contracts(account_equity, r, snapshot.normalized_atr(), config);
            (size, size as f64 * r)
        }
        None => {
            debug!(
                symbol = %snapshot.symbol,
                variant = %intent.variant(),
                outcome = "degenerate_risk",
                "per-contract risk unavailable, order is inert"
            );
            (0, 0.0)
        }
    };

    RiskAdjustedOrder {
        intent,
        params: RiskParams {
            position_size,
            stop_loss_price,
            take_profit_price,
            trailing,
            max_risk_amount,
            reference_price: reference,
        },
    }
}
