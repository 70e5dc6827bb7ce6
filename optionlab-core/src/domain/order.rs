//! Order intents: the abstract multi-leg order a strategy wants to place.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::instrument::{OptionContract, OptionRight};
use crate::strategy::StrategyVariant;

const STRIKE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegSide {
    Buy,
    Sell,
}

/// One leg of an order. `ratio` multiplies the base position size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLeg {
    pub side: LegSide,
    pub contract: OptionContract,
    pub ratio: u32,
}

impl OrderLeg {
    pub fn buy(contract: OptionContract) -> Self {
        Self { side: LegSide::Buy, contract, ratio: 1 }
    }

    pub fn sell(contract: OptionContract) -> Self {
        Self { side: LegSide::Sell, contract, ratio: 1 }
    }
}

/// What the structure is exposed to, which fixes the direction of stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exposure {
    /// Net long delta: stop below entry, target above.
    LongDelta,
    /// Net short delta: stop above entry, target below.
    ShortDelta,
    /// Profits from movement in either direction.
    LongVolatility,
    /// Profits from the underlying staying inside a range.
    ShortVolatility,
}

impl Exposure {
    /// Sign applied to quantity for delta exposures; None for volatility.
    pub fn delta_sign(self) -> Option<f64> {
        match self {
            Exposure::LongDelta => Some(1.0),
            Exposure::ShortDelta => Some(-1.0),
            Exposure::LongVolatility | Exposure::ShortVolatility => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntentError {
    #[error("order intent has no legs")]
    Empty,
    #[error("strategy '{0}' is not implemented")]
    NotImplemented(StrategyVariant),
    #[error("{variant} expects {expected} legs, got {got}")]
    LegCount {
        variant: StrategyVariant,
        expected: usize,
        got: usize,
    },
    #[error("{variant} legs are malformed: {reason}")]
    Structure {
        variant: StrategyVariant,
        reason: &'static str,
    },
    #[error("strike {0} is not positive")]
    NonPositiveStrike(f64),
}

/// Ordered legs plus the strategy and symbol that produced them.
///
/// Constructed only through [`OrderIntent::new`], which checks that the legs
/// form the structure the variant promises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    symbol: String,
    variant: StrategyVariant,
    exposure: Exposure,
    legs: Vec<OrderLeg>,
    created_at: DateTime<Utc>,
}

impl OrderIntent {
    pub fn new(
        symbol: impl Into<String>,
        variant: StrategyVariant,
        legs: Vec<OrderLeg>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, IntentError> {
        let exposure = validate_structure(variant, &legs)?;
        Ok(Self {
            symbol: symbol.into(),
            variant,
            exposure,
            legs,
            created_at,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn variant(&self) -> StrategyVariant {
        self.variant
    }

    pub fn exposure(&self) -> Exposure {
        self.exposure
    }

    pub fn legs(&self) -> &[OrderLeg] {
        &self.legs
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Earliest expiry across legs.
    pub fn nearest_expiry(&self) -> NaiveDate {
        self.legs
            .iter()
            .map(|l| l.contract.expiry)
            .min()
            .unwrap_or_else(|| self.created_at.date_naive())
    }

    /// Widest strike distance between paired legs, in underlying points.
    ///
    /// Spreads: the distance between the two strikes. Condors and
    /// butterflies: the wider of the put and call wings. Zero for
    /// single-strike structures.
    pub fn width(&self) -> f64 {
        match self.legs.len() {
            2 => (self.legs[0].contract.strike - self.legs[1].contract.strike).abs(),
            4 => {
                let put_wing = (self.legs[1].contract.strike - self.legs[0].contract.strike).abs();
                let call_wing = (self.legs[3].contract.strike - self.legs[2].contract.strike).abs();
                put_wing.max(call_wing)
            }
            _ => 0.0,
        }
    }
}

fn structure_err(variant: StrategyVariant, reason: &'static str) -> IntentError {
    IntentError::Structure { variant, reason }
}

fn same(a: f64, b: f64) -> bool {
    (a - b).abs() < STRIKE_EPSILON
}

/// Check leg shape for the variant and derive its exposure.
fn validate_structure(variant: StrategyVariant, legs: &[OrderLeg]) -> Result<Exposure, IntentError> {
    if legs.is_empty() {
        return Err(IntentError::Empty);
    }
    let expected = variant.leg_count().ok_or(IntentError::NotImplemented(variant))?;
    if legs.len() != expected {
        return Err(IntentError::LegCount {
            variant,
            expected,
            got: legs.len(),
        });
    }
    if let Some(bad) = legs.iter().find(|l| l.contract.strike <= 0.0 || !l.contract.strike.is_finite()) {
        return Err(IntentError::NonPositiveStrike(bad.contract.strike));
    }
    if legs.iter().any(|l| l.ratio == 0) {
        return Err(structure_err(variant, "zero leg ratio"));
    }

    match variant {
        StrategyVariant::LongCall => {
            let leg = &legs[0];
            if leg.side != LegSide::Buy || leg.contract.right != OptionRight::Call {
                return Err(structure_err(variant, "expected one bought call"));
            }
            Ok(Exposure::LongDelta)
        }
        StrategyVariant::LongPut => {
            let leg = &legs[0];
            if leg.side != LegSide::Buy || leg.contract.right != OptionRight::Put {
                return Err(structure_err(variant, "expected one bought put"));
            }
            Ok(Exposure::ShortDelta)
        }
        StrategyVariant::Straddle => {
            let (a, b) = (&legs[0], &legs[1]);
            if a.side != LegSide::Buy || b.side != LegSide::Buy {
                return Err(structure_err(variant, "both legs must be bought"));
            }
            if a.contract.right == b.contract.right {
                return Err(structure_err(variant, "expected one call and one put"));
            }
            if !same(a.contract.strike, b.contract.strike) || a.contract.expiry != b.contract.expiry {
                return Err(structure_err(variant, "legs must share strike and expiry"));
            }
            Ok(Exposure::LongVolatility)
        }
        StrategyVariant::VerticalSpread
        | StrategyVariant::BullCallSpread
        | StrategyVariant::BearPutSpread => {
            let (a, b) = (&legs[0], &legs[1]);
            if a.side == b.side {
                return Err(structure_err(variant, "spread legs must have opposing sides"));
            }
            if a.contract.right != b.contract.right {
                return Err(structure_err(variant, "spread legs must share a right"));
            }
            if a.contract.expiry != b.contract.expiry {
                return Err(structure_err(variant, "spread legs must share an expiry"));
            }
            if same(a.contract.strike, b.contract.strike) {
                return Err(structure_err(variant, "spread legs must have distinct strikes"));
            }
            let (bought, sold) = if a.side == LegSide::Buy { (a, b) } else { (b, a) };
            let right = bought.contract.right;
            match variant {
                StrategyVariant::BullCallSpread
                    if right != OptionRight::Call || bought.contract.strike > sold.contract.strike =>
                {
                    Err(structure_err(variant, "expected a long lower-strike call spread"))
                }
                StrategyVariant::BearPutSpread
                    if right != OptionRight::Put || bought.contract.strike < sold.contract.strike =>
                {
                    Err(structure_err(variant, "expected a long higher-strike put spread"))
                }
                _ => Ok(match right {
                    OptionRight::Call => Exposure::LongDelta,
                    OptionRight::Put => Exposure::ShortDelta,
                }),
            }
        }
        StrategyVariant::CalendarSpread => {
            let (a, b) = (&legs[0], &legs[1]);
            if a.side == b.side {
                return Err(structure_err(variant, "calendar legs must have opposing sides"));
            }
            if a.contract.right != b.contract.right || !same(a.contract.strike, b.contract.strike) {
                return Err(structure_err(variant, "calendar legs must share right and strike"));
            }
            let (bought, sold) = if a.side == LegSide::Buy { (a, b) } else { (b, a) };
            if sold.contract.expiry >= bought.contract.expiry {
                return Err(structure_err(variant, "sold leg must expire before bought leg"));
            }
            Ok(Exposure::ShortVolatility)
        }
        StrategyVariant::IronCondor | StrategyVariant::IronButterfly => {
            validate_iron(variant, legs)?;
            Ok(Exposure::ShortVolatility)
        }
        StrategyVariant::Collar
        | StrategyVariant::CoveredCall
        | StrategyVariant::ProtectivePut
        | StrategyVariant::RatioBackspread => Err(IntentError::NotImplemented(variant)),
    }
}

/// Legs in order: bought put, sold put, sold call, bought call.
fn validate_iron(variant: StrategyVariant, legs: &[OrderLeg]) -> Result<(), IntentError> {
    let shape = [
        (LegSide::Buy, OptionRight::Put),
        (LegSide::Sell, OptionRight::Put),
        (LegSide::Sell, OptionRight::Call),
        (LegSide::Buy, OptionRight::Call),
    ];
    for (leg, (side, right)) in legs.iter().zip(shape) {
        if leg.side != side || leg.contract.right != right {
            return Err(structure_err(variant, "expected long put, short put, short call, long call"));
        }
    }
    let expiry = legs[0].contract.expiry;
    if legs.iter().any(|l| l.contract.expiry != expiry) {
        return Err(structure_err(variant, "all legs must share an expiry"));
    }
    let s: Vec<f64> = legs.iter().map(|l| l.contract.strike).collect();
    if !(s[0] < s[1] && s[2] < s[3]) {
        return Err(structure_err(variant, "wings must sit outside the body"));
    }
    if !same(s[1] - s[0], s[3] - s[2]) {
        return Err(structure_err(variant, "put and call wings must have equal widths"));
    }
    let body_ok = match variant {
        StrategyVariant::IronButterfly => same(s[1], s[2]),
        _ => s[1] < s[2] && !same(s[1], s[2]),
    };
    if !body_ok {
        return Err(structure_err(variant, "body strikes do not match the variant"));
    }
    Ok(())
}
