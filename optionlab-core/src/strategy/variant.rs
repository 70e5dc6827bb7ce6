//! Strategy variants.
//!
//! Every variant is matched exhaustively by the leg builder
//! (`strategy::legs`) and by the risk manager's per-contract risk, so adding a
//! variant without teaching both is a compile error.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyVariant {
    LongCall,
    LongPut,
    Straddle,
    IronCondor,
    VerticalSpread,
    BullCallSpread,
    BearPutSpread,
    CalendarSpread,
    IronButterfly,
    // Stubs: selectable by configuration, never buildable.
    Collar,
    CoveredCall,
    ProtectivePut,
    RatioBackspread,
}

impl StrategyVariant {
    pub const ALL: [StrategyVariant; 13] = [
        StrategyVariant::LongCall,
        StrategyVariant::LongPut,
        StrategyVariant::Straddle,
        StrategyVariant::IronCondor,
        StrategyVariant::VerticalSpread,
        StrategyVariant::BullCallSpread,
        StrategyVariant::BearPutSpread,
        StrategyVariant::CalendarSpread,
        StrategyVariant::IronButterfly,
        StrategyVariant::Collar,
        StrategyVariant::CoveredCall,
        StrategyVariant::ProtectivePut,
        StrategyVariant::RatioBackspread,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StrategyVariant::LongCall => "long_call",
            StrategyVariant::LongPut => "long_put",
            StrategyVariant::Straddle => "straddle",
            StrategyVariant::IronCondor => "iron_condor",
            StrategyVariant::VerticalSpread => "vertical_spread",
            StrategyVariant::BullCallSpread => "bull_call_spread",
            StrategyVariant::BearPutSpread => "bear_put_spread",
            StrategyVariant::CalendarSpread => "calendar_spread",
            StrategyVariant::IronButterfly => "iron_butterfly",
            StrategyVariant::Collar => "collar",
            StrategyVariant::CoveredCall => "covered_call",
            StrategyVariant::ProtectivePut => "protective_put",
            StrategyVariant::RatioBackspread => "ratio_backspread",
        }
    }

    /// False for stub variants that have no leg builder.
    pub fn is_implemented(self) -> bool {
        match self {
            StrategyVariant::LongCall
            | StrategyVariant::LongPut
            | StrategyVariant::Straddle
            | StrategyVariant::IronCondor
            | StrategyVariant::VerticalSpread
            | StrategyVariant::BullCallSpread
            | StrategyVariant::BearPutSpread
            | StrategyVariant::CalendarSpread
            | StrategyVariant::IronButterfly => true,
            StrategyVariant::Collar
            | StrategyVariant::CoveredCall
            | StrategyVariant::ProtectivePut
            | StrategyVariant::RatioBackspread => false,
        }
    }

    /// Maximum loss bounded by the structure's strike width.
    pub fn is_defined_risk(self) -> bool {
        match self {
            StrategyVariant::IronCondor
            | StrategyVariant::VerticalSpread
            | StrategyVariant::BullCallSpread
            | StrategyVariant::BearPutSpread
            | StrategyVariant::CalendarSpread
            | StrategyVariant::IronButterfly
            | StrategyVariant::Collar => true,
            StrategyVariant::LongCall
            | StrategyVariant::LongPut
            | StrategyVariant::Straddle
            | StrategyVariant::CoveredCall
            | StrategyVariant::ProtectivePut
            | StrategyVariant::RatioBackspread => false,
        }
    }

    /// Expected number of legs for implemented variants.
    pub fn leg_count(self) -> Option<usize> {
        match self {
            StrategyVariant::LongCall | StrategyVariant::LongPut => Some(1),
            StrategyVariant::Straddle
            | StrategyVariant::VerticalSpread
            | StrategyVariant::BullCallSpread
            | StrategyVariant::BearPutSpread
            | StrategyVariant::CalendarSpread => Some(2),
            StrategyVariant::IronCondor | StrategyVariant::IronButterfly => Some(4),
            StrategyVariant::Collar
            | StrategyVariant::CoveredCall
            | StrategyVariant::ProtectivePut
            | StrategyVariant::RatioBackspread => None,
        }
    }
}

impl fmt::Display for StrategyVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implemented_variants_have_leg_counts() {
        for v in StrategyVariant::ALL {
            assert_eq!(v.is_implemented(), v.leg_count().is_some(), "{v}");
        }
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = StrategyVariant::ALL.iter().map(|v| v.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), StrategyVariant::ALL.len());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&StrategyVariant::IronCondor).unwrap();
        assert_eq!(json, "\"iron_condor\"");
        let back: StrategyVariant = serde_json::from_str("\"bull_call_spread\"").unwrap();
        assert_eq!(back, StrategyVariant::BullCallSpread);
    }
}
