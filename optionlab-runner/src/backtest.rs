//! Bar-driven backtest.
//!
//! Symbols run in parallel; bars within a symbol run strictly in order
//! through one [`SymbolLifecycle`]. Every symbol is sized against the run's
//! initial capital. A fatal pipeline error in any symbol aborts the run.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use optionlab_core::config::{ConfigError, FillPolicy};
use optionlab_core::domain::{Bar, PositionState, TradeEvent};
use optionlab_core::indicators::snapshot_from_bars;
use optionlab_core::ledger::{EquityPoint, TradeLedger};
use optionlab_core::lifecycle::{AcceptOutcome, LifecycleSettings, SymbolLifecycle};
use optionlab_core::providers::{NoNews, Notifier, OrderSubmitter};
use optionlab_core::risk::RiskAdjustedOrder;
use optionlab_core::PipelineError;

use crate::alerts::{AlertDispatcher, DispatchOutcome, LogNotifier};
use crate::config::{RunConfig, RunId};
use crate::data::BarSet;
use crate::ml::LogisticModel;
use crate::pipeline::{evaluate, Advisors, TickDecision};
use crate::submit::DryRunSubmitter;

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("symbol '{0}' not found in loaded data")]
    SymbolNotFound(String),
    #[error("no symbols to run")]
    NoSymbols,
    #[error("run aborted: {0}")]
    Aborted(#[from] PipelineError),
    #[error("thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Per-symbol counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolSummary {
    pub symbol: String,
    pub bars: usize,
    pub skipped_bars: usize,
    pub signals: usize,
    pub no_trades: usize,
    pub blocked: usize,
    pub unavailable: usize,
    pub not_implemented: usize,
    pub submit_failures: usize,
    pub trades: usize,
    pub realized_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: RunConfig,
    pub symbols: Vec<SymbolSummary>,
    pub ledger: TradeLedger,
    pub equity_curve: Vec<EquityPoint>,
    pub total_realized_pnl: f64,
    pub max_drawdown: f64,
    pub trade_count: usize,
    pub win_rate: f64,
    pub alerts_sent: usize,
    pub alerts_suppressed: usize,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Collaborators for a backtest.
pub struct BacktestDeps<'a> {
    pub advisors: Advisors<'a>,
    pub submitter: &'a dyn OrderSubmitter,
    pub notifier: Arc<dyn Notifier>,
}

/// Backtest with the configured logistic model, no news, dry-run fills and
/// log alerts.
pub fn run_dry_backtest(config: &RunConfig, data: &BarSet) -> Result<BacktestReport, RunError> {
    let model = LogisticModel::from_config(&config.engine.ml);
    let deps = BacktestDeps {
        advisors: Advisors {
            ml: &model,
            news: &NoNews,
        },
        submitter: &DryRunSubmitter,
        notifier: Arc::new(LogNotifier),
    };
    run_backtest(config, data, &deps)
}

pub fn run_backtest(config: &RunConfig, data: &BarSet, deps: &BacktestDeps<'_>) -> Result<BacktestReport, RunError> {
    config.validate()?;
    let settings = LifecycleSettings::from_config(&config.engine)?;

    let symbols: Vec<String> = if config.symbols.is_empty() {
        data.keys().cloned().collect()
    } else {
        config.symbols.clone()
    };
    if symbols.is_empty() {
        return Err(RunError::NoSymbols);
    }
    let mut series: Vec<(&str, &[Bar])> = Vec::with_capacity(symbols.len());
    for symbol in &symbols {
        let bars = data.get(symbol).ok_or_else(|| RunError::SymbolNotFound(symbol.clone()))?;
        series.push((symbol.as_str(), bars.as_slice()));
    }

    let run_id = config.run_id();
    info!(run_id = %run_id, symbols = symbols.len(), warmup = config.warmup(), "backtest started");

    let run_all = || -> Result<Vec<SymbolRun>, PipelineError> {
        series
            .par_iter()
            .map(|(symbol, bars)| run_symbol(symbol, bars, config, &settings, deps))
            .collect()
    };
    let runs = if config.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()?
            .install(run_all)
    } else {
        run_all()
    };
    let runs = runs.map_err(|e| {
        error!(run_id = %run_id, error = %e, "backtest aborted");
        e
    })?;

    let mut events: Vec<TradeEvent> = Vec::new();
    let mut summaries = Vec::with_capacity(runs.len());
    for run in runs {
        events.extend(run.events);
        summaries.push(run.summary);
    }
    // Stable: per-symbol order is preserved for equal timestamps.
    events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.symbol.cmp(&b.symbol)));

    let dispatcher = AlertDispatcher::new(
        &config.engine.alerts,
        Arc::clone(&deps.notifier),
        config.alert_channel.clone(),
        config.engine.risk.contract_multiplier,
    );
    let (mut alerts_sent, mut alerts_suppressed) = (0, 0);
    for outcome in dispatcher.dispatch_all(&events) {
        match outcome {
            DispatchOutcome::Sent => alerts_sent += 1,
            DispatchOutcome::Suppressed(_) => alerts_suppressed += 1,
            DispatchOutcome::Failed(_) => {}
        }
    }

    let mut ledger = TradeLedger::new();
    ledger.extend(events);
    let closes: Vec<&TradeEvent> = ledger.closes().collect();
    let trade_count = closes.len();
    let winners = closes.iter().filter(|e| e.is_winner()).count();
    let win_rate = if trade_count == 0 {
        0.0
    } else {
        winners as f64 / trade_count as f64
    };

    let report = BacktestReport {
        schema_version: SCHEMA_VERSION,
        run_id,
        config: config.clone(),
        symbols: summaries,
        equity_curve: ledger.equity_curve(config.initial_capital),
        total_realized_pnl: ledger.total_realized_pnl(),
        max_drawdown: ledger.max_drawdown(config.initial_capital),
        trade_count,
        win_rate,
        alerts_sent,
        alerts_suppressed,
        ledger,
    };
    info!(
        run_id = %report.run_id,
        trades = report.trade_count,
        pnl = report.total_realized_pnl,
        "backtest finished"
    );
    Ok(report)
}

struct SymbolRun {
    summary: SymbolSummary,
    events: Vec<TradeEvent>,
}

fn run_symbol(
    symbol: &str,
    bars: &[Bar],
    config: &RunConfig,
    settings: &LifecycleSettings,
    deps: &BacktestDeps<'_>,
) -> Result<SymbolRun, PipelineError> {
    let mut lc = SymbolLifecycle::new(symbol);
    let mut summary = SymbolSummary {
        symbol: symbol.to_string(),
        bars: bars.len(),
        ..SymbolSummary::default()
    };
    let mut events = Vec::new();
    let mut history: Vec<Bar> = Vec::with_capacity(bars.len());
    let mut pending: Option<RiskAdjustedOrder> = None;
    let warmup = config.warmup();

    for bar in bars {
        if let Some(order) = pending.take() {
            if bar.is_sane() {
                enter(&mut lc, &order, bar.open, bar, deps, &mut summary, &mut events)?;
            }
        }

        match lc.on_bar(bar, settings) {
            Ok(exits) => events.extend(exits),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(symbol, error = %e, "skipping bar");
                summary.skipped_bars += 1;
                continue;
            }
        }
        history.push(bar.clone());

        if lc.state() == PositionState::Open || history.len() < warmup {
            continue;
        }
        if config.session_filter && !settings.hours.is_open(bar.timestamp) {
            continue;
        }

        let snapshot = match snapshot_from_bars(&history, &config.metrics) {
            Ok(s) => s,
            Err(e) => {
                debug!(symbol, error = %e, "snapshot unavailable");
                summary.unavailable += 1;
                continue;
            }
        };
        match evaluate(&snapshot, config.initial_capital, &config.engine, deps.advisors) {
            Ok(TickDecision::Ready(order)) => {
                summary.signals += 1;
                match config.engine.lifecycle.fill_policy {
                    FillPolicy::Close => enter(&mut lc, &order, bar.close, bar, deps, &mut summary, &mut events)?,
                    FillPolicy::NextOpen => pending = Some(order),
                }
            }
            Ok(TickDecision::NoTrade(_)) => summary.no_trades += 1,
            Ok(TickDecision::Blocked(_)) => summary.blocked += 1,
            Err(PipelineError::NotImplementedStrategy(variant)) => {
                error!(symbol, %variant, error = "not_implemented", "selected strategy has no implementation");
                summary.not_implemented += 1;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(symbol, error = %e, "input unavailable");
                summary.unavailable += 1;
            }
        }
    }

    if lc.state() == PositionState::Open {
        if let Some(last) = history.last() {
            events.extend(lc.flatten(last.close, last.timestamp, settings)?);
        }
    }

    summary.trades = events.iter().filter(|e| e.kind.is_close()).count();
    summary.realized_pnl = events.iter().filter_map(|e| e.realized_pnl).sum();
    debug!(symbol, trades = summary.trades, pnl = summary.realized_pnl, "symbol finished");
    Ok(SymbolRun { summary, events })
}

fn enter(
    lc: &mut SymbolLifecycle,
    order: &RiskAdjustedOrder,
    price: f64,
    bar: &Bar,
    deps: &BacktestDeps<'_>,
    summary: &mut SymbolSummary,
    events: &mut Vec<TradeEvent>,
) -> Result<(), PipelineError> {
    if order.is_inert() {
        return Ok(());
    }
    let fill = match deps.submitter.submit(order, price, bar.timestamp) {
        Ok(fill) => fill,
        Err(_) => {
            summary.submit_failures += 1;
            return Ok(());
        }
    };
    match lc.accept(order, fill) {
        Ok(AcceptOutcome::Opened(event)) => events.push(event),
        Ok(AcceptOutcome::Rejected | AcceptOutcome::Inert) => {}
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => warn!(symbol = %lc.symbol(), error = %e, "entry skipped"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use optionlab_core::domain::TradeEventKind;

    use crate::data::synthetic_bars;

    fn data(symbols: &[&str], n: usize) -> BarSet {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap();
        symbols
            .iter()
            .map(|s| (s.to_string(), synthetic_bars(s, start, n)))
            .collect()
    }

    #[test]
    fn unknown_symbol_is_an_error() {
        let config = RunConfig {
            symbols: vec!["NOPE".into()],
            ..RunConfig::default()
        };
        let err = run_dry_backtest(&config, &data(&["SPY"], 30)).unwrap_err();
        assert!(matches!(err, RunError::SymbolNotFound(ref s) if s == "NOPE"));
    }

    #[test]
    fn every_symbol_ends_flat() {
        let report = run_dry_backtest(&RunConfig::default(), &data(&["SPY", "QQQ", "IWM"], 120)).unwrap();
        assert_eq!(report.symbols.len(), 3);
        let opens = report.ledger.count(TradeEventKind::Opened);
        assert_eq!(opens, report.trade_count);
        assert_eq!(report.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn same_config_same_report() {
        let bars = data(&["SPY", "QQQ"], 100);
        let a = run_dry_backtest(&RunConfig::default(), &bars).unwrap();
        let b = run_dry_backtest(&RunConfig::default(), &bars).unwrap();
        assert_eq!(a.ledger, b.ledger);
        assert_eq!(a.run_id, b.run_id);
    }

    #[test]
    fn too_few_bars_never_trades() {
        let report = run_dry_backtest(&RunConfig::default(), &data(&["SPY"], 15)).unwrap();
        assert!(report.ledger.is_empty());
        assert_eq!(report.symbols[0].signals, 0);
    }

    #[test]
    fn duplicate_timestamp_aborts_run() {
        let mut set = data(&["SPY"], 40);
        let bars = set.get_mut("SPY").unwrap();
        let dup = bars[10].clone();
        bars.insert(11, dup);
        let err = run_dry_backtest(&RunConfig::default(), &set).unwrap_err();
        assert!(matches!(err, RunError::Aborted(PipelineError::InvariantViolation { .. })));
    }

    #[test]
    fn void_bar_is_skipped() {
        let mut set = data(&["SPY"], 40);
        set.get_mut("SPY").unwrap()[30].close = f64::NAN;
        let report = run_dry_backtest(&RunConfig::default(), &set).unwrap();
        assert_eq!(report.symbols[0].skipped_bars, 1);
    }

    #[test]
    fn session_filter_blocks_overnight_bars() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap();
        let mut set = BarSet::new();
        set.insert("SPY".into(), synthetic_bars("SPY", start, 80));
        let report = run_dry_backtest(&RunConfig::default(), &set).unwrap();
        assert!(report.ledger.is_empty());
        assert_eq!(report.symbols[0].no_trades + report.symbols[0].signals, 0);

        let config = RunConfig {
            session_filter: false,
            ..RunConfig::default()
        };
        let report = run_dry_backtest(&config, &set).unwrap();
        let s = &report.symbols[0];
        assert!(s.no_trades + s.signals + s.blocked + s.unavailable > 0);
    }

    #[test]
    fn fixed_thread_pool_matches_default() {
        let bars = data(&["SPY", "QQQ"], 90);
        let a = run_dry_backtest(&RunConfig::default(), &bars).unwrap();
        let config = RunConfig {
            threads: 2,
            ..RunConfig::default()
        };
        let b = run_dry_backtest(&config, &bars).unwrap();
        assert_eq!(a.ledger, b.ledger);
    }
}
