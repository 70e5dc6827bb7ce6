use serde::{Deserialize, Serialize};

use crate::domain::OrderIntent;

/// Percentage trail that engages after a favorable move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingStop {
    /// Favorable move from entry, as a fraction, before the trail engages.
    pub activation_pct: f64,
    /// Distance of the stop behind the high-water mark, as a fraction.
    pub trail_pct: f64,
}

impl TrailingStop {
    pub fn is_activated(&self, favorable_move_pct: f64) -> bool {
        favorable_move_pct >= self.activation_pct
    }
}

/// Sizing and exit levels derived from one fresh snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskParams {
    pub position_size: u32,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
    pub trailing: Option<TrailingStop>,
    pub max_risk_amount: f64,
    /// Underlying price the levels were computed from.
    pub reference_price: f64,
}

impl RiskParams {
    pub fn trailing_stop_pct(&self) -> Option<f64> {
        self.trailing.map(|t| t.trail_pct)
    }

    pub fn stop_distance(&self) -> f64 {
        (self.reference_price - self.stop_loss_price).abs()
    }

    pub fn target_distance(&self) -> f64 {
        (self.take_profit_price - self.reference_price).abs()
    }
}

/// An order intent plus its risk parameters.
///
/// `position_size == 0` makes the order inert: every downstream stage treats
/// it as "no trade".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAdjustedOrder {
    pub intent: OrderIntent,
    pub params: RiskParams,
}

impl RiskAdjustedOrder {
    pub fn symbol(&self) -> &str {
        self.intent.symbol()
    }

    pub fn position_size(&self) -> u32 {
        self.params.position_size
    }

    pub fn is_inert(&self) -> bool {
        self.params.position_size == 0
    }

    /// Same order with size forced to zero.
    pub fn into_inert(mut self) -> Self {
        self.params.position_size = 0;
        self.params.max_risk_amount = 0.0;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances_are_absolute() {
        let p = RiskParams {
            position_size: 1,
            stop_loss_price: 103.0,
            take_profit_price: 94.0,
            trailing: None,
            max_risk_amount: 100.0,
            reference_price: 100.0,
        };
        assert_eq!(p.stop_distance(), 3.0);
        assert_eq!(p.target_distance(), 6.0);
        assert_eq!(p.trailing_stop_pct(), None);
    }

    #[test]
    fn trailing_activation_threshold_inclusive() {
        let t = TrailingStop {
            activation_pct: 0.02,
            trail_pct: 0.05,
        };
        assert!(!t.is_activated(0.019));
        assert!(t.is_activated(0.02));
    }
}
