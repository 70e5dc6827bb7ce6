//! Per-symbol position record owned by the lifecycle engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::order::Exposure;
use crate::risk::TrailingStop;
use crate::strategy::StrategyVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    #[default]
    Flat,
    Open,
    /// Last position has closed; behaves like Flat for a new entry.
    Closed,
}

impl PositionState {
    pub fn accepts_entry(self) -> bool {
        !matches!(self, PositionState::Open)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub variant: StrategyVariant,
    pub exposure: Exposure,
    pub entry_price: f64,
    pub current_stop: f64,
    pub current_target: f64,
    /// Distance from entry to stop, used for volatility bands.
    pub stop_distance: f64,
    /// Distance from entry to target, used for volatility bands.
    pub target_distance: f64,
    /// Most favorable price seen since entry (low-water mark for short delta).
    pub high_water_mark: f64,
    pub quantity: u32,
    pub opened_at: DateTime<Utc>,
    pub expiry: NaiveDate,
    pub trailing: Option<TrailingStop>,
    pub trailing_active: bool,
    pub bars_held: u32,
}

impl Position {
    /// Realized P/L if closed at `exit_price`.
    ///
    /// Delta exposures: (exit − entry) × ±qty × multiplier.
    /// Volatility exposures: ±|exit − entry| × qty × multiplier.
    pub fn pnl_at(&self, exit_price: f64, contract_multiplier: f64) -> f64 {
        let qty = self.quantity as f64;
        let move_ = exit_price - self.entry_price;
        match self.exposure {
            Exposure::LongDelta => move_ * qty * contract_multiplier,
            Exposure::ShortDelta => -move_ * qty * contract_multiplier,
            Exposure::LongVolatility => move_.abs() * qty * contract_multiplier,
            Exposure::ShortVolatility => -move_.abs() * qty * contract_multiplier,
        }
    }

    /// Favorable excursion from entry as a fraction of entry price.
    pub fn favorable_move_pct(&self, price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        match self.exposure {
            Exposure::ShortDelta => (self.entry_price - price) / self.entry_price,
            _ => (price - self.entry_price) / self.entry_price,
        }
    }
}
