//! Per-symbol state machine.
//!
//! Per bar, after the entry bar, in this order:
//! 1. stop (gap through the stop fills at the open)
//! 2. target (gap through the target fills at the open)
//! 3. time exit at the close (expiry, end-of-day buffer, holding period)
//! 4. high-water mark and trailing stop update
//!
//! Stop before target is the conservative tie-break when one bar crosses
//! both. Trailing updates come last so a stop tightened on a bar can only
//! trigger on a later bar.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, EngineConfig, LifecycleConfig};
use crate::domain::{Bar, Exposure, Fill, Position, PositionState, TradeEvent, TradeEventKind};
use crate::error::PipelineError;
use crate::lifecycle::ratchet::{RatchetState, StopSide};
use crate::risk::RiskAdjustedOrder;
use crate::time_filter::MarketHours;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LifecycleError {
    #[error("{symbol}: bar at {got} is not after previous bar at {last}")]
    OutOfOrderBar {
        symbol: String,
        last: DateTime<Utc>,
        got: DateTime<Utc>,
    },
    #[error("{symbol}: received data for {got}")]
    SymbolMismatch { symbol: String, got: String },
    #[error("{symbol}: fill at {got} precedes last bar at {last}")]
    StaleFill {
        symbol: String,
        last: DateTime<Utc>,
        got: DateTime<Utc>,
    },
}

impl LifecycleError {
    pub fn symbol(&self) -> &str {
        match self {
            LifecycleError::OutOfOrderBar { symbol, .. }
            | LifecycleError::SymbolMismatch { symbol, .. }
            | LifecycleError::StaleFill { symbol, .. } => symbol,
        }
    }
}

/// Everything the state machine reads from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleSettings {
    pub lifecycle: LifecycleConfig,
    pub contract_multiplier: f64,
    pub hours: MarketHours,
}

impl LifecycleSettings {
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            lifecycle: config.lifecycle.clone(),
            contract_multiplier: config.risk.contract_multiplier,
            hours: MarketHours::from_config(&config.market_hours)?,
        })
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleConfig::default(),
            contract_multiplier: 100.0,
            hours: MarketHours::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AcceptOutcome {
    Opened(TradeEvent),
    /// A position is already open for the symbol. Nothing changed.
    Rejected,
    /// Order had zero size. Nothing changed.
    Inert,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolLifecycle {
    symbol: String,
    state: PositionState,
    position: Option<Position>,
    ratchet: Option<RatchetState>,
    last_bar_at: Option<DateTime<Utc>>,
}

impl SymbolLifecycle {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            state: PositionState::Flat,
            position: None,
            ratchet: None,
            last_bar_at: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn state(&self) -> PositionState {
        self.state
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn last_bar_at(&self) -> Option<DateTime<Utc>> {
        self.last_bar_at
    }

    fn check_symbol(&self, got: &str) -> Result<(), LifecycleError> {
        if got != self.symbol {
            return Err(LifecycleError::SymbolMismatch {
                symbol: self.symbol.clone(),
                got: got.to_string(),
            });
        }
        Ok(())
    }

    /// Open a position from an accepted order filled at `fill`.
    pub fn accept(&mut self, order: &RiskAdjustedOrder, fill: Fill) -> Result<AcceptOutcome, PipelineError> {
        self.check_symbol(order.symbol())?;
        if let Some(last) = self.last_bar_at {
            if fill.timestamp < last {
                return Err(LifecycleError::StaleFill {
                    symbol: self.symbol.clone(),
                    last,
                    got: fill.timestamp,
                }
                .into());
            }
        }
        if !(fill.price.is_finite() && fill.price > 0.0) {
            return Err(PipelineError::input_unavailable(
                &self.symbol,
                format!("invalid fill price {}", fill.price),
            ));
        }
        if order.is_inert() {
            return Ok(AcceptOutcome::Inert);
        }
        if !self.state.accepts_entry() {
            info!(symbol = %self.symbol, outcome = "duplicate_open", "position already open, entry rejected");
            return Ok(AcceptOutcome::Rejected);
        }

        let params = &order.params;
        let exposure = order.intent.exposure();
        let stop_distance = params.stop_distance();
        let target_distance = params.target_distance();
        let (current_stop, current_target) = match exposure {
            Exposure::LongDelta | Exposure::ShortDelta => (params.stop_loss_price, params.take_profit_price),
            Exposure::LongVolatility | Exposure::ShortVolatility => {
                (fill.price - stop_distance, fill.price + target_distance)
            }
        };

        let position = Position {
            symbol: self.symbol.clone(),
            variant: order.intent.variant(),
            exposure,
            entry_price: fill.price,
            current_stop,
            current_target,
            stop_distance,
            target_distance,
            high_water_mark: fill.price,
            quantity: params.position_size,
            opened_at: fill.timestamp,
            expiry: order.intent.nearest_expiry(),
            trailing: params.trailing,
            trailing_active: false,
            bars_held: 0,
        };
        let event = TradeEvent {
            symbol: self.symbol.clone(),
            kind: TradeEventKind::Opened,
            variant: position.variant,
            price: fill.price,
            quantity: position.quantity,
            timestamp: fill.timestamp,
            realized_pnl: None,
        };

        self.ratchet = StopSide::for_exposure(exposure).map(|side| RatchetState::new(side, current_stop));
        self.position = Some(position);
        self.state = PositionState::Open;
        info!(
            symbol = %self.symbol,
            variant = %event.variant,
            price = fill.price,
            quantity = event.quantity,
            "position opened"
        );
        Ok(AcceptOutcome::Opened(event))
    }

    /// Consume the next bar. Bars must arrive in strictly increasing time.
    pub fn on_bar(&mut self, bar: &Bar, settings: &LifecycleSettings) -> Result<Vec<TradeEvent>, PipelineError> {
        self.check_symbol(&bar.symbol)?;
        if let Some(last) = self.last_bar_at {
            if bar.timestamp <= last {
                return Err(LifecycleError::OutOfOrderBar {
                    symbol: self.symbol.clone(),
                    last,
                    got: bar.timestamp,
                }
                .into());
            }
        }
        if !bar.is_sane() {
            return Err(PipelineError::input_unavailable(&self.symbol, "malformed bar"));
        }

        self.last_bar_at = Some(bar.timestamp);
        let mut events = Vec::new();
        if self.state != PositionState::Open {
            return Ok(events);
        }
        let Some(pos) = self.position.as_mut() else {
            return Ok(events);
        };
        if bar.timestamp <= pos.opened_at {
            return Ok(events);
        }
        pos.bars_held += 1;

        let exit = price_exit(pos, bar).or_else(|| time_exit(pos, bar, settings));
        if let Some((kind, price)) = exit {
            events.extend(self.close(kind, price, bar.timestamp, settings.contract_multiplier));
            return Ok(events);
        }

        if let Some(event) = self.update_trailing(bar) {
            events.push(event);
        }
        Ok(events)
    }

    /// Close any open position at `price` with `closed_flat`.
    pub fn flatten(
        &mut self,
        price: f64,
        timestamp: DateTime<Utc>,
        settings: &LifecycleSettings,
    ) -> Result<Option<TradeEvent>, PipelineError> {
        if self.state != PositionState::Open {
            return Ok(None);
        }
        if let Some(last) = self.last_bar_at {
            if timestamp < last {
                return Err(LifecycleError::StaleFill {
                    symbol: self.symbol.clone(),
                    last,
                    got: timestamp,
                }
                .into());
            }
        }
        if !(price.is_finite() && price > 0.0) {
            return Err(PipelineError::input_unavailable(
                &self.symbol,
                format!("invalid flatten price {price}"),
            ));
        }
        Ok(self.close(TradeEventKind::ClosedFlat, price, timestamp, settings.contract_multiplier))
    }

    /// Unrealized P/L of the open position at `price`.
    pub fn unrealized_pnl(&self, price: f64, contract_multiplier: f64) -> Option<f64> {
        self.position.as_ref().map(|p| p.pnl_at(price, contract_multiplier))
    }

    fn close(
        &mut self,
        kind: TradeEventKind,
        price: f64,
        timestamp: DateTime<Utc>,
        multiplier: f64,
    ) -> Option<TradeEvent> {
        let pos = self.position.take()?;
        let pnl = pos.pnl_at(price, multiplier);
        self.ratchet = None;
        self.state = PositionState::Closed;
        info!(symbol = %self.symbol, kind = %kind, price, pnl, "position closed");
        Some(TradeEvent {
            symbol: self.symbol.clone(),
            kind,
            variant: pos.variant,
            price,
            quantity: pos.quantity,
            timestamp,
            realized_pnl: Some(pnl),
        })
    }

    fn update_trailing(&mut self, bar: &Bar) -> Option<TradeEvent> {
        let pos = self.position.as_mut()?;
        let side = StopSide::for_exposure(pos.exposure)?;
        let trailing = pos.trailing?;
        let ratchet = self.ratchet.as_mut()?;

        let extreme = match side {
            StopSide::Below => bar.high.max(pos.high_water_mark),
            StopSide::Above => bar.low.min(pos.high_water_mark),
        };
        let new_extreme = extreme != pos.high_water_mark;
        pos.high_water_mark = extreme;

        if !pos.trailing_active {
            if !trailing.is_activated(pos.favorable_move_pct(extreme)) {
                return None;
            }
            pos.trailing_active = true;
            debug!(symbol = %pos.symbol, hwm = extreme, "trailing stop activated");
        } else if !new_extreme {
            return None;
        }

        let proposed = match side {
            StopSide::Below => extreme * (1.0 - trailing.trail_pct),
            StopSide::Above => extreme * (1.0 + trailing.trail_pct),
        };
        let level = ratchet.apply(proposed);
        if level == pos.current_stop {
            return None;
        }
        pos.current_stop = level;
        Some(TradeEvent {
            symbol: pos.symbol.clone(),
            kind: TradeEventKind::TrailingAdjusted,
            variant: pos.variant,
            price: level,
            quantity: pos.quantity,
            timestamp: bar.timestamp,
            realized_pnl: None,
        })
    }
}

/// Stop or target crossing within the bar, stop first.
fn price_exit(pos: &Position, bar: &Bar) -> Option<(TradeEventKind, f64)> {
    match pos.exposure {
        Exposure::LongDelta => {
            if bar.low <= pos.current_stop {
                return Some((TradeEventKind::StoppedOut, bar.open.min(pos.current_stop)));
            }
            if bar.high >= pos.current_target {
                return Some((TradeEventKind::TookProfit, bar.open.max(pos.current_target)));
            }
            None
        }
        Exposure::ShortDelta => {
            if bar.high >= pos.current_stop {
                return Some((TradeEventKind::StoppedOut, bar.open.max(pos.current_stop)));
            }
            if bar.low <= pos.current_target {
                return Some((TradeEventKind::TookProfit, bar.open.min(pos.current_target)));
            }
            None
        }
        Exposure::ShortVolatility => {
            let (lo, hi) = (pos.entry_price - pos.stop_distance, pos.entry_price + pos.stop_distance);
            band_breach(bar, lo, hi).map(|p| (TradeEventKind::StoppedOut, p))
        }
        Exposure::LongVolatility => {
            let (lo, hi) = (pos.entry_price - pos.target_distance, pos.entry_price + pos.target_distance);
            band_breach(bar, lo, hi).map(|p| (TradeEventKind::TookProfit, p))
        }
    }
}

/// Fill price when the bar leaves the band [lo, hi]; gaps fill at the open.
fn band_breach(bar: &Bar, lo: f64, hi: f64) -> Option<f64> {
    if bar.open <= lo || bar.open >= hi {
        Some(bar.open)
    } else if bar.low <= lo {
        Some(lo)
    } else if bar.high >= hi {
        Some(hi)
    } else {
        None
    }
}

fn time_exit(pos: &Position, bar: &Bar, settings: &LifecycleSettings) -> Option<(TradeEventKind, f64)> {
    let cfg = &settings.lifecycle;
    let expired = cfg.exit_at_expiry && bar.timestamp.date_naive() >= pos.expiry;
    let end_of_day = cfg.flatten_end_of_day && settings.hours.in_end_of_day_buffer(bar.timestamp);
    let held_too_long = cfg.max_holding_bars > 0 && pos.bars_held >= cfg.max_holding_bars;
    (expired || end_of_day || held_too_long).then_some((TradeEventKind::TimeExit, bar.close))
}
