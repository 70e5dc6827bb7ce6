//! Strategy Selector: a pure decision table over IV regime, trend and momentum.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SelectorConfig;
use crate::domain::{IntentError, MarketSnapshot, OrderIntent};
use crate::error::PipelineError;
use crate::strategy::legs::{build_legs, LegPlan};
use crate::strategy::StrategyVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IvRegime {
    High,
    /// Below threshold but at or above `threshold × borderline_iv_ratio`.
    Borderline,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

/// Why the selector declined to trade. Not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum NoTradeReason {
    InvalidInput(&'static str),
    /// Momentum opposes a trend that is too weak to override it.
    MomentumConflict,
    /// The decision table has no variant for this cell.
    NoTableEntry { regime: IvRegime, trend: TrendDirection },
    InvalidStructure(IntentError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Trade(OrderIntent),
    NoTrade(NoTradeReason),
}

impl Selection {
    pub fn intent(&self) -> Option<&OrderIntent> {
        match self {
            Selection::Trade(intent) => Some(intent),
            Selection::NoTrade(_) => None,
        }
    }

    pub fn into_intent(self) -> Option<OrderIntent> {
        match self {
            Selection::Trade(intent) => Some(intent),
            Selection::NoTrade(_) => None,
        }
    }
}

/// IV regime and trend direction for a snapshot whose fields are finite.
pub fn classify(snapshot: &MarketSnapshot, config: &SelectorConfig) -> (IvRegime, TrendDirection) {
    let regime = if snapshot.iv >= config.iv_threshold {
        IvRegime::High
    } else if snapshot.iv >= config.iv_threshold * config.borderline_iv_ratio {
        IvRegime::Borderline
    } else {
        IvRegime::Low
    };
    let trend = if snapshot.trend > config.trend_deadband {
        TrendDirection::Up
    } else if snapshot.trend < -config.trend_deadband {
        TrendDirection::Down
    } else {
        TrendDirection::Flat
    };
    (regime, trend)
}

/// Pick a variant from the decision table, or say why not.
pub fn choose_variant(snapshot: &MarketSnapshot, config: &SelectorConfig) -> Result<StrategyVariant, NoTradeReason> {
    if let Some(field) = snapshot.invalid_field() {
        return Err(NoTradeReason::InvalidInput(field));
    }
    let (regime, trend) = classify(snapshot, config);

    if trend != TrendDirection::Flat {
        let opposed = snapshot.momentum * snapshot.trend < 0.0;
        let weak = snapshot.trend.abs() < config.trend_deadband + config.momentum_margin;
        if opposed && weak {
            return Err(NoTradeReason::MomentumConflict);
        }
    }

    let table = &config.decision_table;
    let cell = match (regime, trend) {
        (IvRegime::High, TrendDirection::Flat) if config.capital_preservation => table.high_iv_flat_preserve,
        (IvRegime::High, TrendDirection::Flat) => table.high_iv_flat,
        (IvRegime::High, TrendDirection::Up) => table.high_iv_up,
        (IvRegime::High, TrendDirection::Down) => table.high_iv_down,
        (IvRegime::Borderline | IvRegime::Low, TrendDirection::Flat) => table.low_iv_flat,
        (IvRegime::Borderline, TrendDirection::Up) => table.low_iv_up_borderline,
        (IvRegime::Low, TrendDirection::Up) => table.low_iv_up,
        (IvRegime::Borderline, TrendDirection::Down) => table.low_iv_down_borderline,
        (IvRegime::Low, TrendDirection::Down) => table.low_iv_down,
    };
    cell.ok_or(NoTradeReason::NoTableEntry { regime, trend })
}

/// Map a snapshot to an order intent, or NoTrade.
///
/// The only error is a stub variant coming out of the decision table.
pub fn select(snapshot: &MarketSnapshot, config: &SelectorConfig) -> Result<Selection, PipelineError> {
    let variant = match choose_variant(snapshot, config) {
        Ok(v) => v,
        Err(reason) => {
            debug!(symbol = %snapshot.symbol, outcome = "no_trade", ?reason, "selector declined");
            return Ok(Selection::NoTrade(reason));
        }
    };
    if !variant.is_implemented() {
        return Err(PipelineError::NotImplementedStrategy(variant));
    }

    let plan = LegPlan::new(
        snapshot.symbol.clone(),
        snapshot.price,
        snapshot.timestamp.date_naive(),
        config.strike_width,
        snapshot.trend >= 0.0,
    );
    let built = build_legs(variant, &plan)
        .and_then(|legs| OrderIntent::new(snapshot.symbol.clone(), variant, legs, snapshot.timestamp));
    match built {
        Ok(intent) => {
            debug!(symbol = %snapshot.symbol, %variant, outcome = "selected", "selector chose strategy");
            Ok(Selection::Trade(intent))
        }
        Err(IntentError::NotImplemented(v)) => Err(PipelineError::NotImplementedStrategy(v)),
        Err(err) => {
            debug!(symbol = %snapshot.symbol, %variant, outcome = "no_trade", error = %err, "invalid structure");
            Ok(Selection::NoTrade(NoTradeReason::InvalidStructure(err)))
        }
    }
}
