//! Ratchet invariant for trailing stops.
//!
//! **Core rule:** a stop may tighten, never loosen.

use serde::{Deserialize, Serialize};

use crate::domain::Exposure;

/// Which side of price the stop sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopSide {
    /// Long delta: stop below price, may only rise.
    Below,
    /// Short delta: stop above price, may only fall.
    Above,
}

impl StopSide {
    /// `None` for volatility exposures, which do not trail.
    pub fn for_exposure(exposure: Exposure) -> Option<Self> {
        match exposure {
            Exposure::LongDelta => Some(StopSide::Below),
            Exposure::ShortDelta => Some(StopSide::Above),
            Exposure::LongVolatility | Exposure::ShortVolatility => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatchetState {
    level: f64,
    side: StopSide,
}

impl RatchetState {
    pub fn new(side: StopSide, initial_level: f64) -> Self {
        Self {
            level: initial_level,
            side,
        }
    }

    /// Apply a proposed level and return the ratcheted one.
    ///
    /// ```
    /// use optionlab_core::lifecycle::{RatchetState, StopSide};
    ///
    /// let mut ratchet = RatchetState::new(StopSide::Below, 95.0);
    /// assert_eq!(ratchet.apply(100.0), 100.0);
    /// assert_eq!(ratchet.apply(90.0), 100.0);
    /// ```
    pub fn apply(&mut self, proposed: f64) -> f64 {
        if proposed.is_nan() {
            return self.level;
        }
        self.level = match self.side {
            StopSide::Below => self.level.max(proposed),
            StopSide::Above => self.level.min(proposed),
        };
        self.level
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn side(&self) -> StopSide {
        self.side
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_tightening_allowed() {
        let mut r = RatchetState::new(StopSide::Below, 95.0);
        assert_eq!(r.apply(100.0), 100.0);
        assert_eq!(r.level(), 100.0);
    }

    #[test]
    fn below_loosening_blocked() {
        let mut r = RatchetState::new(StopSide::Below, 100.0);
        assert_eq!(r.apply(90.0), 100.0);
    }

    #[test]
    fn above_tightening_allowed() {
        let mut r = RatchetState::new(StopSide::Above, 105.0);
        assert_eq!(r.apply(100.0), 100.0);
    }

    #[test]
    fn above_loosening_blocked() {
        let mut r = RatchetState::new(StopSide::Above, 100.0);
        assert_eq!(r.apply(110.0), 100.0);
    }

    #[test]
    fn nan_proposal_ignored() {
        let mut r = RatchetState::new(StopSide::Below, 100.0);
        assert_eq!(r.apply(f64::NAN), 100.0);
    }

    #[test]
    fn volatility_exposures_have_no_side() {
        assert_eq!(StopSide::for_exposure(Exposure::LongDelta), Some(StopSide::Below));
        assert_eq!(StopSide::for_exposure(Exposure::ShortDelta), Some(StopSide::Above));
        assert_eq!(StopSide::for_exposure(Exposure::ShortVolatility), None);
    }

    #[test]
    fn volatility_trap_scenario() {
        // Price rose, ATR doubled: proposed stop is looser than current.
        let mut r = RatchetState::new(StopSide::Below, 95.0);
        assert_eq!(r.apply(90.0), 95.0);
    }
}
