//! Tick orchestration across a symbol set.
//!
//! Each tick evaluates every flat symbol in parallel. Per-symbol state lives
//! in a [`LifecycleBook`]. A symbol's slot lock is held from the flat check
//! through submission and acceptance, so concurrent ticks for one symbol
//! send at most one order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{error, warn};

use optionlab_core::config::{ConfigError, EngineConfig};
use optionlab_core::domain::{Bar, PositionState, TradeEvent};
use optionlab_core::gate::GateVerdict;
use optionlab_core::ledger::TradeLedger;
use optionlab_core::lifecycle::{AcceptOutcome, LifecycleBook, LifecycleSettings, SymbolLifecycle};
use optionlab_core::providers::{MetricsProvider, MlProvider, NewsProvider, Notifier, OrderSubmitter, SubmitError};
use optionlab_core::strategy::{NoTradeReason, StrategyVariant};
use optionlab_core::PipelineError;

use crate::alerts::AlertDispatcher;
use crate::pipeline::{evaluate, Advisors, TickDecision};

/// External collaborators, shared across worker threads.
#[derive(Clone)]
pub struct Collaborators {
    pub metrics: Arc<dyn MetricsProvider>,
    pub ml: Arc<dyn MlProvider>,
    pub news: Arc<dyn NewsProvider>,
    pub submitter: Arc<dyn OrderSubmitter>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    SessionClosed,
    PositionOpen,
    InputUnavailable(String),
    NotImplemented(StrategyVariant),
    NoTrade(NoTradeReason),
    Blocked(GateVerdict),
    SubmitFailed(SubmitError),
    /// Sized to zero contracts. Nothing was submitted.
    Inert,
    Opened(TradeEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTick {
    pub symbol: String,
    pub outcome: TickOutcome,
}

pub struct TickEngine {
    config: EngineConfig,
    book: LifecycleBook,
    collaborators: Collaborators,
    alerts: AlertDispatcher,
    ledger: Mutex<TradeLedger>,
    initial_equity: f64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn untracked_fill(symbol: &str, detail: &str) -> PipelineError {
    error!(symbol, detail, "broker fill not tracked");
    PipelineError::InvariantViolation {
        symbol: symbol.to_string(),
        detail: format!("filled order not tracked: {detail}"),
    }
}

impl TickEngine {
    pub fn new(
        config: EngineConfig,
        collaborators: Collaborators,
        initial_equity: f64,
        alert_channel: &str,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let settings = LifecycleSettings::from_config(&config)?;
        let alerts = AlertDispatcher::new(
            &config.alerts,
            Arc::clone(&collaborators.notifier),
            alert_channel,
            config.risk.contract_multiplier,
        );
        Ok(Self {
            book: LifecycleBook::new(settings),
            config,
            collaborators,
            alerts,
            ledger: Mutex::new(TradeLedger::new()),
            initial_equity,
        })
    }

    pub fn book(&self) -> &LifecycleBook {
        &self.book
    }

    pub fn alerts(&self) -> &AlertDispatcher {
        &self.alerts
    }

    pub fn ledger(&self) -> TradeLedger {
        lock(&self.ledger).clone()
    }

    /// Initial equity plus realized P/L so far.
    pub fn equity(&self) -> f64 {
        self.initial_equity + lock(&self.ledger).total_realized_pnl()
    }

    /// Evaluate every symbol at `timestamp`. Stops on the first fatal error.
    pub fn tick(&self, symbols: &[String], timestamp: DateTime<Utc>) -> Result<Vec<SymbolTick>, PipelineError> {
        let equity = self.equity();
        symbols
            .par_iter()
            .map(|symbol| {
                self.tick_symbol(symbol, timestamp, equity).map(|outcome| SymbolTick {
                    symbol: symbol.clone(),
                    outcome,
                })
            })
            .collect()
    }

    fn tick_symbol(&self, symbol: &str, ts: DateTime<Utc>, equity: f64) -> Result<TickOutcome, PipelineError> {
        if !self.book.settings().hours.is_open(ts) {
            return Ok(TickOutcome::SessionClosed);
        }
        // The symbol's lock is held from the flat check through accept, so a
        // second tick for the symbol waits here and then sees the position.
        let outcome = self.book.with_symbol(symbol, |lc, _| self.open_locked(lc, symbol, ts, equity))?;
        if let TickOutcome::Opened(event) = &outcome {
            self.record(std::slice::from_ref(event));
        }
        Ok(outcome)
    }

    fn open_locked(
        &self,
        lc: &mut SymbolLifecycle,
        symbol: &str,
        ts: DateTime<Utc>,
        equity: f64,
    ) -> Result<TickOutcome, PipelineError> {
        if lc.state() == PositionState::Open {
            return Ok(TickOutcome::PositionOpen);
        }
        if let Some(last) = lc.last_bar_at() {
            if ts < last {
                warn!(symbol, %last, tick = %ts, "tick precedes last bar, skipping symbol");
                return Ok(TickOutcome::InputUnavailable(format!("tick at {ts} precedes last bar at {last}")));
            }
        }

        let snapshot = match self.collaborators.metrics.get_snapshot(symbol, ts) {
            Ok(s) => s,
            Err(e) => {
                warn!(symbol, error = %e, "snapshot unavailable, skipping symbol this tick");
                return Ok(TickOutcome::InputUnavailable(e.to_string()));
            }
        };
        let advisors = Advisors {
            ml: self.collaborators.ml.as_ref(),
            news: self.collaborators.news.as_ref(),
        };
        let order = match evaluate(&snapshot, equity, &self.config, advisors) {
            Ok(TickDecision::Ready(order)) => order,
            Ok(TickDecision::NoTrade(reason)) => return Ok(TickOutcome::NoTrade(reason)),
            Ok(TickDecision::Blocked(outcome)) => return Ok(TickOutcome::Blocked(outcome.verdict)),
            Err(PipelineError::NotImplementedStrategy(variant)) => {
                error!(symbol, %variant, error = "not_implemented", "selected strategy has no implementation");
                return Ok(TickOutcome::NotImplemented(variant));
            }
            Err(e) if !e.is_fatal() => {
                warn!(symbol, error = %e, "input unavailable");
                return Ok(TickOutcome::InputUnavailable(e.to_string()));
            }
            Err(e) => return Err(e),
        };
        if order.is_inert() {
            return Ok(TickOutcome::Inert);
        }

        let fill = match self.collaborators.submitter.submit(&order, snapshot.price, ts) {
            Ok(fill) => fill,
            Err(e) => return Ok(TickOutcome::SubmitFailed(e)),
        };
        // From here on the broker holds a fill; anything but a tracked
        // position is corrupted state.
        match lc.accept(&order, fill) {
            Ok(AcceptOutcome::Opened(event)) => Ok(TickOutcome::Opened(event)),
            Ok(other) => Err(untracked_fill(symbol, &format!("{other:?}"))),
            Err(e) => Err(untracked_fill(symbol, &e.to_string())),
        }
    }

    /// Feed a bar to the symbol's state machine and record any exits.
    pub fn on_bar(&self, bar: &Bar) -> Result<Vec<TradeEvent>, PipelineError> {
        let events = self.book.on_bar(bar)?;
        self.record(&events);
        Ok(events)
    }

    pub fn flatten(&self, symbol: &str, price: f64, ts: DateTime<Utc>) -> Result<Option<TradeEvent>, PipelineError> {
        let event = self.book.flatten(symbol, price, ts)?;
        if let Some(e) = &event {
            self.record(std::slice::from_ref(e));
        }
        Ok(event)
    }

    fn record(&self, events: &[TradeEvent]) {
        if events.is_empty() {
            return;
        }
        lock(&self.ledger).extend(events.iter().cloned());
        self.alerts.dispatch_all(events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use chrono::{Duration, TimeZone};
    use optionlab_core::domain::{Fill, MarketSnapshot, TradeEventKind};
    use optionlab_core::providers::{NoModel, NoNews, ProviderError};
    use optionlab_core::risk::RiskAdjustedOrder;

    use crate::alerts::LogNotifier;
    use crate::submit::DryRunSubmitter;

    struct FixedMetrics;

    impl MetricsProvider for FixedMetrics {
        fn get_snapshot(&self, symbol: &str, timestamp: DateTime<Utc>) -> Result<MarketSnapshot, ProviderError> {
            if symbol == "MISSING" {
                return Err(ProviderError::Unavailable {
                    symbol: symbol.into(),
                    reason: "no history".into(),
                });
            }
            Ok(MarketSnapshot {
                symbol: symbol.into(),
                timestamp,
                price: 500.0,
                iv: 0.15,
                trend: 0.8,
                momentum: 0.6,
                atr: 2.0,
            })
        }
    }

    /// Slow broker that counts orders and fills `lag` before the tick.
    struct SlowBroker {
        submits: AtomicUsize,
        lag: Duration,
    }

    impl SlowBroker {
        fn new(lag: Duration) -> Arc<Self> {
            Arc::new(Self {
                submits: AtomicUsize::new(0),
                lag,
            })
        }
    }

    impl OrderSubmitter for SlowBroker {
        fn submit(&self, _order: &RiskAdjustedOrder, price: f64, ts: DateTime<Utc>) -> Result<Fill, SubmitError> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            thread::sleep(std::time::Duration::from_millis(20));
            Ok(Fill::new(price, ts - self.lag))
        }
    }

    fn engine_with(submitter: Arc<dyn OrderSubmitter>) -> TickEngine {
        let collaborators = Collaborators {
            metrics: Arc::new(FixedMetrics),
            ml: Arc::new(NoModel),
            news: Arc::new(NoNews),
            submitter,
            notifier: Arc::new(LogNotifier),
        };
        TickEngine::new(EngineConfig::default(), collaborators, 100_000.0, "trades").unwrap()
    }

    fn engine() -> TickEngine {
        engine_with(Arc::new(DryRunSubmitter))
    }

    fn session(minutes: i64) -> DateTime<Utc> {
        // 10:00 New York (UTC−5)
        Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn symbols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn opens_each_flat_symbol_once() {
        let e = engine();
        let first = e.tick(&symbols(&["SPY", "QQQ"]), session(0)).unwrap();
        assert!(first.iter().all(|t| matches!(t.outcome, TickOutcome::Opened(_))));
        assert_eq!(e.book().open_symbols(), vec!["QQQ", "SPY"]);

        let second = e.tick(&symbols(&["SPY"]), session(1)).unwrap();
        assert_eq!(second[0].outcome, TickOutcome::PositionOpen);
        assert_eq!(e.ledger().count(TradeEventKind::Opened), 2);
    }

    #[test]
    fn missing_metrics_skip_only_that_symbol() {
        let e = engine();
        let ticks = e.tick(&symbols(&["MISSING", "SPY"]), session(0)).unwrap();
        assert!(matches!(ticks[0].outcome, TickOutcome::InputUnavailable(_)));
        assert!(matches!(ticks[1].outcome, TickOutcome::Opened(_)));
    }

    #[test]
    fn closed_session_opens_nothing() {
        let e = engine();
        let night = session(10 * 60);
        let ticks = e.tick(&symbols(&["SPY"]), night).unwrap();
        assert_eq!(ticks[0].outcome, TickOutcome::SessionClosed);
        assert!(e.book().open_symbols().is_empty());
    }

    #[test]
    fn concurrent_ticks_open_a_symbol_once() {
        let e = Arc::new(engine());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let e = Arc::clone(&e);
                thread::spawn(move || e.tick(&symbols(&["SPY"]), session(0)).unwrap())
            })
            .collect();
        let opened = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .filter(|t| matches!(t.outcome, TickOutcome::Opened(_)))
            .count();
        assert_eq!(opened, 1);
    }

    #[test]
    fn concurrent_ticks_send_one_order() {
        let broker = SlowBroker::new(Duration::zero());
        let e = Arc::new(engine_with(broker.clone()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let e = Arc::clone(&e);
                thread::spawn(move || e.tick(&symbols(&["SPY"]), session(0)).unwrap())
            })
            .collect();
        let outcomes: Vec<TickOutcome> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .map(|t| t.outcome)
            .collect();

        assert_eq!(broker.submits.load(Ordering::SeqCst), 1);
        assert_eq!(outcomes.iter().filter(|o| matches!(o, TickOutcome::Opened(_))).count(), 1);
        assert_eq!(outcomes.iter().filter(|o| **o == TickOutcome::PositionOpen).count(), 7);
        assert_eq!(e.ledger().count(TradeEventKind::Opened), 1);
    }

    #[test]
    fn tick_before_last_bar_sends_nothing() {
        let broker = SlowBroker::new(Duration::zero());
        let e = engine_with(broker.clone());
        let bar = Bar {
            symbol: "SPY".into(),
            timestamp: session(10),
            open: 500.0,
            high: 501.0,
            low: 499.0,
            close: 500.0,
            volume: 1_000.0,
        };
        e.on_bar(&bar).unwrap();
        let ticks = e.tick(&symbols(&["SPY"]), session(5)).unwrap();
        assert!(matches!(ticks[0].outcome, TickOutcome::InputUnavailable(_)));
        assert_eq!(broker.submits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn backdated_fill_is_fatal() {
        let broker = SlowBroker::new(Duration::minutes(30));
        let e = engine_with(broker.clone());
        let bar = Bar {
            symbol: "SPY".into(),
            timestamp: session(5),
            open: 500.0,
            high: 501.0,
            low: 499.0,
            close: 500.0,
            volume: 1_000.0,
        };
        e.on_bar(&bar).unwrap();

        let err = e.tick(&symbols(&["SPY"]), session(10)).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(broker.submits.load(Ordering::SeqCst), 1);
        assert!(e.ledger().is_empty());
    }

    #[test]
    fn stop_out_updates_equity() {
        let e = engine();
        e.tick(&symbols(&["SPY"]), session(0)).unwrap();
        let bar = Bar {
            symbol: "SPY".into(),
            timestamp: session(5),
            open: 499.0,
            high: 499.5,
            low: 495.0,
            close: 496.0,
            volume: 1_000.0,
        };
        let events = e.on_bar(&bar).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, TradeEventKind::StoppedOut);
        assert!(e.equity() < 100_000.0);
        assert_eq!(e.book().state("SPY"), PositionState::Closed);
    }

    #[test]
    fn flatten_records_close() {
        let e = engine();
        e.tick(&symbols(&["SPY"]), session(0)).unwrap();
        let event = e.flatten("SPY", 501.0, session(30)).unwrap().unwrap();
        assert_eq!(event.kind, TradeEventKind::ClosedFlat);
        assert_eq!(e.ledger().len(), 2);
        assert!(e.flatten("SPY", 501.0, session(31)).unwrap().is_none());
    }
}
