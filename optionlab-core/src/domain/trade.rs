//! TradeEvent: one immutable entry in the append-only trade ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::strategy::StrategyVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeEventKind {
    Opened,
    StoppedOut,
    TookProfit,
    TrailingAdjusted,
    ClosedFlat,
    TimeExit,
}

impl TradeEventKind {
    pub const ALL: [TradeEventKind; 6] = [
        TradeEventKind::Opened,
        TradeEventKind::StoppedOut,
        TradeEventKind::TookProfit,
        TradeEventKind::TrailingAdjusted,
        TradeEventKind::ClosedFlat,
        TradeEventKind::TimeExit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TradeEventKind::Opened => "opened",
            TradeEventKind::StoppedOut => "stopped_out",
            TradeEventKind::TookProfit => "took_profit",
            TradeEventKind::TrailingAdjusted => "trailing_adjusted",
            TradeEventKind::ClosedFlat => "closed_flat",
            TradeEventKind::TimeExit => "time_exit",
        }
    }

    /// Whether this event ends the position.
    pub fn is_close(self) -> bool {
        matches!(
            self,
            TradeEventKind::StoppedOut
                | TradeEventKind::TookProfit
                | TradeEventKind::ClosedFlat
                | TradeEventKind::TimeExit
        )
    }
}

impl fmt::Display for TradeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `price` is the fill price for opens and closes, and the new stop level
/// for `TrailingAdjusted`. `realized_pnl` is set only on closing events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub symbol: String,
    pub kind: TradeEventKind,
    pub variant: StrategyVariant,
    pub price: f64,
    pub quantity: u32,
    pub timestamp: DateTime<Utc>,
    pub realized_pnl: Option<f64>,
}

impl TradeEvent {
    /// price × quantity × contract multiplier.
    pub fn notional(&self, contract_multiplier: f64) -> f64 {
        self.price * self.quantity as f64 * contract_multiplier
    }

    pub fn is_winner(&self) -> bool {
        self.realized_pnl.is_some_and(|p| p > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(kind: TradeEventKind, pnl: Option<f64>) -> TradeEvent {
        TradeEvent {
            symbol: "SPY".into(),
            kind,
            variant: StrategyVariant::LongCall,
            price: 500.0,
            quantity: 3,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap(),
            realized_pnl: pnl,
        }
    }

    #[test]
    fn closing_kinds() {
        let closes: Vec<_> = TradeEventKind::ALL.iter().filter(|k| k.is_close()).collect();
        assert_eq!(closes.len(), 4);
        assert!(!TradeEventKind::Opened.is_close());
        assert!(!TradeEventKind::TrailingAdjusted.is_close());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&TradeEventKind::StoppedOut).unwrap();
        assert_eq!(json, "\"stopped_out\"");
        assert_eq!(TradeEventKind::TookProfit.to_string(), "took_profit");
    }

    #[test]
    fn notional_uses_multiplier() {
        assert_eq!(event(TradeEventKind::Opened, None).notional(100.0), 150_000.0);
    }

    #[test]
    fn winner_requires_positive_realized_pnl() {
        assert!(event(TradeEventKind::TookProfit, Some(12.0)).is_winner());
        assert!(!event(TradeEventKind::StoppedOut, Some(-12.0)).is_winner());
        assert!(!event(TradeEventKind::Opened, None).is_winner());
    }
}
