//! Parameter grid search over backtest settings.
//!
//! Every point of a [`ParamGrid`] is a full backtest over the same bars. A
//! point whose backtest fails is kept as a row with an error and no P/L, so
//! one bad combination never hides the rest of the grid.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use optionlab_core::config::ConfigError;
use optionlab_core::providers::NoNews;

use crate::alerts::LogNotifier;
use crate::backtest::{run_backtest, BacktestDeps, BacktestReport, RunError};
use crate::config::{RunConfig, RunId, RunOverrides};
use crate::data::BarSet;
use crate::ml::LogisticModel;
use crate::pipeline::Advisors;
use crate::submit::DryRunSubmitter;

/// Values to sweep for each parameter. The grid is their cross product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub iv_thresholds: Vec<f64>,
    pub end_buffer_minutes: Vec<u32>,
    pub initial_capitals: Vec<f64>,
    pub ml: Vec<bool>,
    pub risk_management: Vec<bool>,
    pub news: Vec<bool>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            iv_thresholds: vec![0.2, 0.25, 0.3],
            end_buffer_minutes: vec![5, 10, 15],
            initial_capitals: vec![100_000.0],
            ml: vec![false, true],
            risk_management: vec![false, true],
            news: vec![false, true],
        }
    }
}

impl ParamGrid {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn size(&self) -> usize {
        self.iv_thresholds.len()
            * self.end_buffer_minutes.len()
            * self.initial_capitals.len()
            * self.ml.len()
            * self.risk_management.len()
            * self.news.len()
    }

    /// Grid points in row-major order: IV threshold outermost, news toggle
    /// innermost.
    pub fn points(&self) -> Vec<SweepPoint> {
        let mut points = Vec::with_capacity(self.size());
        for &iv_threshold in &self.iv_thresholds {
            for &end_buffer_minutes in &self.end_buffer_minutes {
                for &initial_capital in &self.initial_capitals {
                    for &ml in &self.ml {
                        for &risk_management in &self.risk_management {
                            for &news in &self.news {
                                points.push(SweepPoint {
                                    iv_threshold,
                                    end_buffer_minutes,
                                    initial_capital,
                                    ml,
                                    risk_management,
                                    news,
                                });
                            }
                        }
                    }
                }
            }
        }
        points
    }

    pub fn generate_configs(&self, base: &RunConfig) -> Vec<(SweepPoint, RunConfig)> {
        self.points().into_iter().map(|p| (p, p.apply(base))).collect()
    }
}

/// One combination of swept parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub iv_threshold: f64,
    pub end_buffer_minutes: u32,
    pub initial_capital: f64,
    pub ml: bool,
    pub risk_management: bool,
    pub news: bool,
}

impl SweepPoint {
    pub fn overrides(&self) -> RunOverrides {
        RunOverrides {
            iv_threshold: Some(self.iv_threshold),
            end_buffer_minutes: Some(self.end_buffer_minutes),
            initial_capital: Some(self.initial_capital),
            ml: Some(self.ml),
            news: Some(self.news),
            risk_management: Some(self.risk_management),
        }
    }

    pub fn apply(&self, base: &RunConfig) -> RunConfig {
        let mut config = base.clone();
        self.overrides().apply(&mut config);
        config
    }
}

/// Outcome of one grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub point: SweepPoint,
    pub run_id: Option<RunId>,
    /// `None` when the backtest failed.
    pub net_pnl: Option<f64>,
    pub trades: usize,
    pub win_rate: f64,
    pub max_drawdown: f64,
    pub error: Option<String>,
}

impl SweepRow {
    fn from_result(point: SweepPoint, result: Result<BacktestReport, RunError>) -> Self {
        match result {
            Ok(report) => Self {
                point,
                run_id: Some(report.run_id),
                net_pnl: Some(report.total_realized_pnl),
                trades: report.trade_count,
                win_rate: report.win_rate,
                max_drawdown: report.max_drawdown,
                error: None,
            },
            Err(e) => {
                warn!(?point, error = %e, "sweep point failed");
                Self {
                    point,
                    run_id: None,
                    net_pnl: None,
                    trades: 0,
                    win_rate: 0.0,
                    max_drawdown: 0.0,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Rows in grid order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepResults {
    rows: Vec<SweepRow>,
}

impl SweepResults {
    pub fn all(&self) -> &[SweepRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.rows.iter().filter(|r| r.error.is_some()).count()
    }

    /// Successful rows by net P/L, best first. Failed rows are left out.
    pub fn sorted_by_net_pnl(&self) -> Vec<&SweepRow> {
        let mut sorted: Vec<&SweepRow> = self.rows.iter().filter(|r| r.net_pnl.is_some()).collect();
        sorted.sort_by(|a, b| b.net_pnl.unwrap_or(0.0).total_cmp(&a.net_pnl.unwrap_or(0.0)));
        sorted
    }

    pub fn top_n(&self, n: usize) -> Vec<&SweepRow> {
        self.sorted_by_net_pnl().into_iter().take(n).collect()
    }

    pub fn best(&self) -> Option<&SweepRow> {
        self.sorted_by_net_pnl().into_iter().next()
    }
}

/// Runs backtests for every point of a grid, optionally in parallel.
pub struct ParamSweep<'a> {
    deps: &'a BacktestDeps<'a>,
    parallel: bool,
}

impl<'a> ParamSweep<'a> {
    pub fn new(deps: &'a BacktestDeps<'a>) -> Self {
        Self { deps, parallel: true }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn sweep(&self, grid: &ParamGrid, base: &RunConfig, data: &BarSet) -> SweepResults {
        let configs = grid.generate_configs(base);
        info!(points = configs.len(), parallel = self.parallel, "sweep started");

        let run = |(point, config): &(SweepPoint, RunConfig)| {
            SweepRow::from_result(*point, run_backtest(config, data, self.deps))
        };
        let rows: Vec<SweepRow> = if self.parallel {
            configs.par_iter().map(run).collect()
        } else {
            configs.iter().map(run).collect()
        };

        let results = SweepResults { rows };
        info!(
            points = results.len(),
            failures = results.failures(),
            best = ?results.best().and_then(|r| r.net_pnl),
            "sweep finished"
        );
        results
    }
}

/// Sweep with the base config's logistic model, no news, dry-run fills and
/// log alerts.
pub fn run_dry_sweep(grid: &ParamGrid, base: &RunConfig, data: &BarSet, parallel: bool) -> SweepResults {
    let model = LogisticModel::from_config(&base.engine.ml);
    let deps = BacktestDeps {
        advisors: Advisors {
            ml: &model,
            news: &NoNews,
        },
        submitter: &DryRunSubmitter,
        notifier: Arc::new(LogNotifier),
    };
    ParamSweep::new(&deps).with_parallelism(parallel).sweep(grid, base, data)
}

/// One row per grid point.
///
/// Columns: iv_threshold, end_buffer, initial_capital, enable_ml,
/// enable_risk_management, enable_news_risk, net_pl, trades, win_rate,
/// max_drawdown, error. `net_pl` is empty for failed points.
pub fn export_sweep_csv(results: &SweepResults) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "iv_threshold",
        "end_buffer",
        "initial_capital",
        "enable_ml",
        "enable_risk_management",
        "enable_news_risk",
        "net_pl",
        "trades",
        "win_rate",
        "max_drawdown",
        "error",
    ])?;
    for r in results.all() {
        let p = &r.point;
        wtr.write_record([
            p.iv_threshold.to_string(),
            p.end_buffer_minutes.to_string(),
            format!("{:.2}", p.initial_capital),
            p.ml.to_string(),
            p.risk_management.to_string(),
            p.news.to_string(),
            r.net_pnl.map(|v| format!("{v:.2}")).unwrap_or_default(),
            r.trades.to_string(),
            format!("{:.4}", r.win_rate),
            format!("{:.4}", r.max_drawdown),
            r.error.clone().unwrap_or_default(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write `summary.csv` into `output_dir`. Returns the file path.
pub fn save_sweep_summary(results: &SweepResults, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create sweep dir: {}", output_dir.display()))?;
    let path = output_dir.join("summary.csv");
    std::fs::write(&path, export_sweep_csv(results)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
