//! Append-only trade ledger and equity-curve reconstruction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{TradeEvent, TradeEventKind};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    pub realized_pnl: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeLedger {
    events: Vec<TradeEvent>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: TradeEvent) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = TradeEvent>) {
        self.events.extend(events);
    }

    pub fn events(&self) -> &[TradeEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn closes(&self) -> impl Iterator<Item = &TradeEvent> {
        self.events.iter().filter(|e| e.kind.is_close())
    }

    pub fn count(&self, kind: TradeEventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    pub fn total_realized_pnl(&self) -> f64 {
        self.closes().filter_map(|e| e.realized_pnl).sum()
    }

    /// Cumulative realized P/L by close timestamp, starting from `initial_capital`.
    ///
    /// Closes are ordered by timestamp (stable for ties), so events appended
    /// from several symbols out of time order still produce a monotone curve
    /// in time.
    pub fn equity_curve(&self, initial_capital: f64) -> Vec<EquityPoint> {
        let mut closes: Vec<&TradeEvent> = self.closes().collect();
        closes.sort_by_key(|e| e.timestamp);
        let mut equity = initial_capital;
        closes
            .into_iter()
            .map(|e| {
                let pnl = e.realized_pnl.unwrap_or(0.0);
                equity += pnl;
                EquityPoint {
                    timestamp: e.timestamp,
                    equity,
                    realized_pnl: pnl,
                }
            })
            .collect()
    }

    /// Deepest peak-to-trough fall of the equity curve, as a fraction of peak.
    pub fn max_drawdown(&self, initial_capital: f64) -> f64 {
        let mut peak = initial_capital;
        let mut worst = 0.0_f64;
        for point in self.equity_curve(initial_capital) {
            peak = peak.max(point.equity);
            if peak > 0.0 {
                worst = worst.max((peak - point.equity) / peak);
            }
        }
        worst
    }
}
