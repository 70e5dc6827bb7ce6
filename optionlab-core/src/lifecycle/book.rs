//! Registry of per-symbol state machines.
//!
//! The map lock is held only long enough to find or create a symbol's slot.
//! Each slot has its own mutex, so bars for one symbol are serialised while
//! other symbols proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::domain::{Bar, Fill, Position, PositionState, TradeEvent};
use crate::error::PipelineError;
use crate::lifecycle::engine::{AcceptOutcome, LifecycleSettings, SymbolLifecycle};
use crate::risk::RiskAdjustedOrder;

type Slot = Arc<Mutex<SymbolLifecycle>>;

#[derive(Debug)]
pub struct LifecycleBook {
    settings: LifecycleSettings,
    symbols: Mutex<HashMap<String, Slot>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LifecycleBook {
    pub fn new(settings: LifecycleSettings) -> Self {
        Self {
            settings,
            symbols: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    fn slot(&self, symbol: &str) -> Slot {
        let mut map = lock(&self.symbols);
        map.entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SymbolLifecycle::new(symbol))))
            .clone()
    }

    /// Run `f` with exclusive access to one symbol's state machine.
    ///
    /// Use this when a read (e.g. "is the symbol flat?") and a following
    /// write must not interleave with another thread.
    pub fn with_symbol<R>(&self, symbol: &str, f: impl FnOnce(&mut SymbolLifecycle, &LifecycleSettings) -> R) -> R {
        let slot = self.slot(symbol);
        let mut guard = lock(&slot);
        f(&mut *guard, &self.settings)
    }

    pub fn accept(&self, order: &RiskAdjustedOrder, fill: Fill) -> Result<AcceptOutcome, PipelineError> {
        self.with_symbol(order.symbol(), |lc, _| lc.accept(order, fill))
    }

    pub fn on_bar(&self, bar: &Bar) -> Result<Vec<TradeEvent>, PipelineError> {
        self.with_symbol(&bar.symbol, |lc, settings| lc.on_bar(bar, settings))
    }

    pub fn flatten(&self, symbol: &str, price: f64, timestamp: DateTime<Utc>) -> Result<Option<TradeEvent>, PipelineError> {
        self.with_symbol(symbol, |lc, settings| lc.flatten(price, timestamp, settings))
    }

    pub fn state(&self, symbol: &str) -> PositionState {
        let Some(slot) = lock(&self.symbols).get(symbol).cloned() else {
            return PositionState::Flat;
        };
        let state = lock(&slot).state();
        state
    }

    pub fn position(&self, symbol: &str) -> Option<Position> {
        let slot = lock(&self.symbols).get(symbol).cloned()?;
        let position = lock(&slot).position().cloned();
        position
    }

    /// Symbols with an open position, sorted.
    pub fn open_symbols(&self) -> Vec<String> {
        let slots: Vec<(String, Slot)> = lock(&self.symbols)
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        let mut open: Vec<String> = slots
            .into_iter()
            .filter(|(_, slot)| lock(slot).state() == PositionState::Open)
            .map(|(k, _)| k)
            .collect();
        open.sort();
        open
    }
}
