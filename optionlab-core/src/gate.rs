//! Confidence Gate: binary news veto and ML threshold.
//!
//! News is checked first and is a hard veto. A sub-gate disabled in
//! configuration always passes, as does ML when no model is loaded.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::GateConfig;
use crate::risk::RiskAdjustedOrder;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum GateVerdict {
    Passed,
    /// Order was already inert on arrival.
    Inert,
    NewsVeto,
    MlBelowThreshold { probability: f64, threshold: f64 },
    /// Probability outside [0, 1] or NaN.
    MlInvalid,
}

impl GateVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, GateVerdict::Passed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    pub order: RiskAdjustedOrder,
    pub verdict: GateVerdict,
}

/// Apply the gate. `ml_probability` is `None` when no model is loaded.
pub fn gate(
    order: RiskAdjustedOrder,
    ml_probability: Option<f64>,
    news_blocked: bool,
    config: &GateConfig,
) -> GateOutcome {
    let verdict = evaluate(&order, ml_probability, news_blocked, config);
    if verdict != GateVerdict::Passed && verdict != GateVerdict::Inert {
        info!(symbol = %order.symbol(), outcome = "gate_veto", ?verdict, "order vetoed");
    }
    let order = if verdict.is_pass() { order } else { order.into_inert() };
    GateOutcome { order, verdict }
}

fn evaluate(
    order: &RiskAdjustedOrder,
    ml_probability: Option<f64>,
    news_blocked: bool,
    config: &GateConfig,
) -> GateVerdict {
    if config.news_enabled && news_blocked {
        return GateVerdict::NewsVeto;
    }
    if order.is_inert() {
        return GateVerdict::Inert;
    }
    if config.ml_enabled {
        if let Some(p) = ml_probability {
            if !(0.0..=1.0).contains(&p) {
                return GateVerdict::MlInvalid;
            }
            if p < config.ml_confidence_threshold {
                return GateVerdict::MlBelowThreshold {
                    probability: p,
                    threshold: config.ml_confidence_threshold,
                };
            }
        }
    }
    GateVerdict::Passed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OptionContract, OptionRight, OrderIntent, OrderLeg};
    use crate::risk::RiskParams;
    use crate::strategy::StrategyVariant;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn order(size: u32) -> RiskAdjustedOrder {
        let expiry = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        let legs = vec![OrderLeg::buy(OptionContract::new("SPY", expiry, 100.0, OptionRight::Call))];
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap();
        RiskAdjustedOrder {
            intent: OrderIntent::new("SPY", StrategyVariant::LongCall, legs, ts).unwrap(),
            params: RiskParams {
                position_size: size,
                stop_loss_price: 97.0,
                take_profit_price: 106.0,
                trailing: None,
                max_risk_amount: 500.0,
                reference_price: 100.0,
            },
        }
    }

    #[test]
    fn news_veto_overrides_confident_model() {
        let out = gate(order(5), Some(0.95), true, &GateConfig::default());
        assert_eq!(out.verdict, GateVerdict::NewsVeto);
        assert_eq!(out.order.position_size(), 0);
    }

    #[test]
    fn below_threshold_zeroes_size() {
        let out = gate(order(5), Some(0.4), false, &GateConfig::default());
        assert!(matches!(out.verdict, GateVerdict::MlBelowThreshold { .. }));
        assert!(out.order.is_inert());
    }

    #[test]
    fn above_threshold_passes_size_unchanged() {
        let out = gate(order(5), Some(0.61), false, &GateConfig::default());
        assert_eq!(out.verdict, GateVerdict::Passed);
        assert_eq!(out.order.position_size(), 5);
    }

    #[test]
    fn missing_model_passes() {
        let out = gate(order(5), None, false, &GateConfig::default());
        assert!(out.verdict.is_pass());
    }

    #[test]
    fn disabled_sub_gates_always_pass() {
        let config = GateConfig {
            ml_enabled: false,
            news_enabled: false,
            ml_confidence_threshold: 0.9,
        };
        let out = gate(order(5), Some(0.1), true, &config);
        assert_eq!(out.verdict, GateVerdict::Passed);
        assert_eq!(out.order.position_size(), 5);
    }

    #[test]
    fn nan_probability_vetoes() {
        let out = gate(order(5), Some(f64::NAN), false, &GateConfig::default());
        assert_eq!(out.verdict, GateVerdict::MlInvalid);
        assert!(out.order.is_inert());
    }

    #[test]
    fn inert_order_stays_inert() {
        let out = gate(order(0), Some(0.99), false, &GateConfig::default());
        assert_eq!(out.verdict, GateVerdict::Inert);
        assert!(out.order.is_inert());
    }
}
