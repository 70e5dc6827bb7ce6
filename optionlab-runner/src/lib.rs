//! OptionLab runner: orchestration around `optionlab-core`.
//!
//! - Run configuration with content-addressed run ids
//! - CSV bar loading and synthetic series
//! - Single-snapshot pipeline evaluation and parallel live ticks
//! - Bar-driven backtests across symbols and parameter grid sweeps
//! - Dry-run and retrying order submission
//! - Alert dispatch, news filter, logistic confidence model
//! - JSON/CSV/summary export

pub mod alerts;
pub mod backtest;
pub mod config;
pub mod data;
pub mod live;
pub mod ml;
pub mod news;
pub mod pipeline;
pub mod report;
pub mod submit;
pub mod sweep;

pub use alerts::{AlertDispatcher, DispatchOutcome, LogNotifier};
pub use backtest::{run_backtest, run_dry_backtest, BacktestDeps, BacktestReport, RunError, SymbolSummary, SCHEMA_VERSION};
pub use config::{RunConfig, RunId, RunOverrides};
pub use data::{load_bars_csv, parse_bars_csv, synthetic_bars, BarSet, LoadError};
pub use live::{Collaborators, SymbolTick, TickEngine, TickOutcome};
pub use ml::LogisticModel;
pub use news::{CalendarEvent, Headline, HeadlineNewsFilter, Impact};
pub use pipeline::{evaluate, Advisors, TickDecision};
pub use report::{export_equity_csv, export_json, export_trades_csv, import_json, load_artifacts, save_artifacts, DailySummary};
pub use submit::{Backoff, DryRunSubmitter, RetryPolicy, RetryingSubmitter};
pub use sweep::{
    export_sweep_csv, run_dry_sweep, save_sweep_summary, ParamGrid, ParamSweep, SweepPoint, SweepResults, SweepRow,
};
