//! Leg construction per variant.
//!
//! Strikes are placed around the at-the-money strike (price rounded to the
//! nearest whole number). Near expiry is the next Friday after the snapshot
//! date; calendar spreads buy the Friday after that.

use chrono::{Duration, NaiveDate};

use crate::domain::{next_friday, IntentError, OptionContract, OptionRight, OrderLeg};
use crate::strategy::StrategyVariant;

/// Strike and expiry grid for one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct LegPlan {
    pub underlying: String,
    pub atm: f64,
    pub width: f64,
    pub expiry: NaiveDate,
    pub far_expiry: NaiveDate,
    /// Direction for variants that can be built either way (vertical spread).
    pub bullish: bool,
}

impl LegPlan {
    pub fn new(underlying: impl Into<String>, price: f64, date: NaiveDate, width: f64, bullish: bool) -> Self {
        let expiry = next_friday(date);
        Self {
            underlying: underlying.into(),
            atm: price.round(),
            width,
            expiry,
            far_expiry: expiry + Duration::days(7),
            bullish,
        }
    }

    fn contract(&self, offset: f64, right: OptionRight) -> OptionContract {
        OptionContract::new(self.underlying.clone(), self.expiry, self.atm + offset, right)
    }

    fn far_contract(&self, right: OptionRight) -> OptionContract {
        OptionContract::new(self.underlying.clone(), self.far_expiry, self.atm, right)
    }
}

/// Legs for `variant` on `plan`. Stub variants are an error, never a fallback.
pub fn build_legs(variant: StrategyVariant, plan: &LegPlan) -> Result<Vec<OrderLeg>, IntentError> {
    use OptionRight::{Call, Put};
    let w = plan.width;
    let legs = match variant {
        StrategyVariant::LongCall => vec![OrderLeg::buy(plan.contract(0.0, Call))],
        StrategyVariant::LongPut => vec![OrderLeg::buy(plan.contract(0.0, Put))],
        StrategyVariant::Straddle => vec![
            OrderLeg::buy(plan.contract(0.0, Call)),
            OrderLeg::buy(plan.contract(0.0, Put)),
        ],
        StrategyVariant::BullCallSpread => vec![
            OrderLeg::buy(plan.contract(0.0, Call)),
            OrderLeg::sell(plan.contract(w, Call)),
        ],
        StrategyVariant::BearPutSpread => vec![
            OrderLeg::buy(plan.contract(0.0, Put)),
            OrderLeg::sell(plan.contract(-w, Put)),
        ],
        StrategyVariant::VerticalSpread if plan.bullish => vec![
            OrderLeg::buy(plan.contract(0.0, Call)),
            OrderLeg::sell(plan.contract(w, Call)),
        ],
        StrategyVariant::VerticalSpread => vec![
            OrderLeg::buy(plan.contract(0.0, Put)),
            OrderLeg::sell(plan.contract(-w, Put)),
        ],
        StrategyVariant::CalendarSpread => vec![
            OrderLeg::sell(plan.contract(0.0, Call)),
            OrderLeg::buy(plan.far_contract(Call)),
        ],
        StrategyVariant::IronCondor => vec![
            OrderLeg::buy(plan.contract(-2.0 * w, Put)),
            OrderLeg::sell(plan.contract(-w, Put)),
            OrderLeg::sell(plan.contract(w, Call)),
            OrderLeg::buy(plan.contract(2.0 * w, Call)),
        ],
        StrategyVariant::IronButterfly => vec![
            OrderLeg::buy(plan.contract(-w, Put)),
            OrderLeg::sell(plan.contract(0.0, Put)),
            OrderLeg::sell(plan.contract(0.0, Call)),
            OrderLeg::buy(plan.contract(w, Call)),
        ],
        StrategyVariant::Collar
        | StrategyVariant::CoveredCall
        | StrategyVariant::ProtectivePut
        | StrategyVariant::RatioBackspread => return Err(IntentError::NotImplemented(variant)),
    };
    Ok(legs)
}
