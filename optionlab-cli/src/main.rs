//! OptionLab CLI.
//!
//! Commands:
//! - `backtest`: run the pipeline over CSV or synthetic bars and save artifacts
//! - `sweep`: grid search over backtest settings, writing `summary.csv`
//! - `select`: evaluate one hand-entered snapshot and print the decision
//! - `equity`: print the equity curve and summary of a saved run

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use optionlab_core::config::EngineConfig;
use optionlab_core::domain::MarketSnapshot;
use optionlab_core::providers::NoNews;
use optionlab_runner::{
    evaluate, load_artifacts, load_bars_csv, run_dry_backtest, run_dry_sweep, save_artifacts, save_sweep_summary,
    synthetic_bars, Advisors, BacktestReport, BarSet, DailySummary, LogisticModel, ParamGrid, RunConfig,
    RunOverrides, SweepResults, TickDecision,
};

#[derive(Parser)]
#[command(name = "optionlab", about = "OptionLab: options strategy selection and risk pipeline")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest and save report.json, trades.csv, equity.csv, summary.txt.
    Backtest {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        overrides: OverrideArgs,

        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Backtest every point of a parameter grid and write summary.csv.
    Sweep {
        #[command(flatten)]
        data: DataArgs,

        /// TOML grid file. Axes given on the command line replace its values.
        #[arg(long)]
        grid: Option<PathBuf>,

        #[arg(long, value_delimiter = ',')]
        iv_thresholds: Vec<f64>,

        #[arg(long, value_delimiter = ',')]
        end_buffer_minutes: Vec<u32>,

        #[arg(long, value_delimiter = ',')]
        initial_capitals: Vec<f64>,

        /// Run grid points one after another.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Rows to print, best net P/L first.
        #[arg(long, default_value_t = 5)]
        top: usize,

        #[arg(long, default_value = "results/sweep")]
        output_dir: PathBuf,
    },
    /// Evaluate one snapshot through selector, risk manager and gate.
    Select {
        #[arg(long, default_value = "SPY")]
        symbol: String,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        iv: f64,
        #[arg(long)]
        trend: f64,
        #[arg(long)]
        momentum: f64,
        #[arg(long)]
        atr: f64,
        /// RFC 3339 timestamp. Defaults to now.
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        #[arg(long, default_value_t = 100_000.0)]
        equity: f64,
        /// Path to a TOML engine config.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the equity curve of a saved run directory.
    Equity {
        /// Run directory containing report.json.
        run_dir: PathBuf,

        /// Print the curve as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Args)]
struct DataArgs {
    /// Path to a TOML run config. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV bars: symbol,timestamp,open,high,low,close,volume.
    #[arg(long)]
    bars: Option<PathBuf>,

    /// Generate this many synthetic bars per symbol instead of reading CSV.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Symbols (overrides the config's list).
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,
}

#[derive(Args)]
struct OverrideArgs {
    #[arg(long)]
    iv_threshold: Option<f64>,

    #[arg(long)]
    end_buffer_minutes: Option<u32>,

    #[arg(long)]
    initial_capital: Option<f64>,

    /// Skip the ML confidence check.
    #[arg(long, default_value_t = false)]
    no_ml: bool,

    /// Ignore the news filter.
    #[arg(long, default_value_t = false)]
    no_news: bool,

    /// Turn off trailing stops and the end-of-day flatten.
    #[arg(long, default_value_t = false)]
    no_risk_management: bool,
}

impl OverrideArgs {
    fn to_overrides(&self) -> RunOverrides {
        RunOverrides {
            iv_threshold: self.iv_threshold,
            end_buffer_minutes: self.end_buffer_minutes,
            initial_capital: self.initial_capital,
            ml: self.no_ml.then_some(false),
            news: self.no_news.then_some(false),
            risk_management: self.no_risk_management.then_some(false),
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Backtest {
            data,
            overrides,
            output_dir,
        } => run_backtest_cmd(data, &overrides.to_overrides(), &output_dir),
        Commands::Sweep {
            data,
            grid,
            iv_thresholds,
            end_buffer_minutes,
            initial_capitals,
            sequential,
            top,
            output_dir,
        } => {
            let mut grid = match grid {
                Some(path) => ParamGrid::load(&path).with_context(|| format!("loading {}", path.display()))?,
                None => ParamGrid::default(),
            };
            if !iv_thresholds.is_empty() {
                grid.iv_thresholds = iv_thresholds;
            }
            if !end_buffer_minutes.is_empty() {
                grid.end_buffer_minutes = end_buffer_minutes;
            }
            if !initial_capitals.is_empty() {
                grid.initial_capitals = initial_capitals;
            }
            run_sweep_cmd(data, &grid, sequential, top, &output_dir)
        }
        Commands::Select {
            symbol,
            price,
            iv,
            trend,
            momentum,
            atr,
            at,
            equity,
            config,
        } => {
            let snapshot = MarketSnapshot {
                symbol,
                timestamp: at.unwrap_or_else(Utc::now),
                price,
                iv,
                trend,
                momentum,
                atr,
            };
            run_select(&snapshot, equity, config.as_deref())
        }
        Commands::Equity { run_dir, json } => run_equity(&run_dir, json),
    }
}

fn load_run(args: DataArgs) -> Result<(RunConfig, BarSet)> {
    let mut config = match args.config {
        Some(path) => RunConfig::load(&path).with_context(|| format!("loading {}", path.display()))?,
        None => RunConfig::default(),
    };
    if !args.symbols.is_empty() {
        config.symbols = args.symbols;
    }

    let data: BarSet = match (args.bars, args.synthetic) {
        (Some(_), Some(_)) => bail!("--bars and --synthetic are mutually exclusive"),
        (Some(path), None) => load_bars_csv(&path).with_context(|| format!("loading bars from {}", path.display()))?,
        (None, Some(n)) => {
            if config.symbols.is_empty() {
                config.symbols = vec!["SPY".to_string()];
            }
            let start = Utc::now() - chrono::Duration::days(n as i64 * 7 / 5 + 7);
            let start = start
                .date_naive()
                .and_hms_opt(15, 0, 0)
                .context("invalid synthetic start time")?
                .and_utc();
            config
                .symbols
                .iter()
                .map(|s| (s.clone(), synthetic_bars(s, start, n)))
                .collect()
        }
        (None, None) => bail!("one of --bars or --synthetic is required"),
    };
    Ok((config, data))
}

fn run_backtest_cmd(args: DataArgs, overrides: &RunOverrides, output_dir: &Path) -> Result<()> {
    let (mut config, data) = load_run(args)?;
    overrides.apply(&mut config);

    let report = run_dry_backtest(&config, &data)?;
    print_report(&report);

    let run_dir = save_artifacts(&report, output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_sweep_cmd(args: DataArgs, grid: &ParamGrid, sequential: bool, top: usize, output_dir: &Path) -> Result<()> {
    let (config, data) = load_run(args)?;
    if grid.size() == 0 {
        bail!("parameter grid is empty");
    }
    println!("Sweeping {} combinations", grid.size());

    let results = run_dry_sweep(grid, &config, &data, !sequential);
    print_sweep(&results, top);

    let path = save_sweep_summary(&results, output_dir)?;
    println!("Summary saved to: {}", path.display());
    Ok(())
}

fn print_sweep(results: &SweepResults, top: usize) {
    println!(
        "{:>6} {:>6} {:>12} {:>5} {:>5} {:>5} {:>7} {:>12}",
        "iv", "buffer", "capital", "ml", "risk", "news", "trades", "net_pl"
    );
    for r in results.top_n(top) {
        let p = &r.point;
        println!(
            "{:>6.3} {:>6} {:>12.0} {:>5} {:>5} {:>5} {:>7} {:>12.2}",
            p.iv_threshold,
            p.end_buffer_minutes,
            p.initial_capital,
            p.ml,
            p.risk_management,
            p.news,
            r.trades,
            r.net_pnl.unwrap_or(0.0)
        );
    }
    if results.failures() > 0 {
        println!("{} of {} combinations failed; see summary.csv", results.failures(), results.len());
    }
}

fn print_report(report: &BacktestReport) {
    println!("Run {}", &report.run_id[..12.min(report.run_id.len())]);
    println!(
        "{:<8} {:>6} {:>8} {:>9} {:>8} {:>8} {:>12}",
        "symbol", "bars", "signals", "no_trade", "blocked", "trades", "pnl"
    );
    for s in &report.symbols {
        println!(
            "{:<8} {:>6} {:>8} {:>9} {:>8} {:>8} {:>12.2}",
            s.symbol, s.bars, s.signals, s.no_trades, s.blocked, s.trades, s.realized_pnl
        );
    }
    println!();
    println!("Trades:        {}", report.trade_count);
    println!("Win rate:      {:.1}%", report.win_rate * 100.0);
    println!("Realized P/L:  {:+.2}", report.total_realized_pnl);
    println!("Max drawdown:  {:.2}%", report.max_drawdown * 100.0);
    println!("Alerts:        {} sent, {} suppressed", report.alerts_sent, report.alerts_suppressed);
}

fn run_select(snapshot: &MarketSnapshot, equity: f64, config_path: Option<&Path>) -> Result<()> {
    let config = match config_path {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let model = LogisticModel::from_config(&config.ml);
    let advisors = Advisors {
        ml: &model,
        news: &NoNews,
    };

    match evaluate(snapshot, equity, &config, advisors)? {
        TickDecision::NoTrade(reason) => println!("No trade: {reason:?}"),
        TickDecision::Blocked(outcome) => {
            println!("Blocked by gate: {:?}", outcome.verdict);
            println!("Strategy would have been {}", outcome.order.intent.variant());
        }
        TickDecision::Ready(order) => {
            let p = &order.params;
            println!("Strategy:   {}", order.intent.variant());
            println!("Exposure:   {:?}", order.intent.exposure());
            for leg in order.intent.legs() {
                println!("  {:?} {} x{}", leg.side, leg.contract.occ_symbol(), leg.ratio);
            }
            println!("Contracts:  {}", p.position_size);
            println!("Max risk:   {:.2}", p.max_risk_amount);
            println!("Stop:       {:.2}", p.stop_loss_price);
            println!("Target:     {:.2}", p.take_profit_price);
            if let Some(t) = p.trailing {
                println!(
                    "Trailing:   {:.1}% after {:.1}% move",
                    t.trail_pct * 100.0,
                    t.activation_pct * 100.0
                );
            }
        }
    }
    Ok(())
}

fn run_equity(run_dir: &Path, json: bool) -> Result<()> {
    let report = load_artifacts(run_dir)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report.equity_curve)?);
        return Ok(());
    }
    println!("{:<26} {:>14} {:>12}", "timestamp", "equity", "realized");
    for p in &report.equity_curve {
        println!("{:<26} {:>14.2} {:>12.2}", p.timestamp.to_rfc3339(), p.equity, p.realized_pnl);
    }
    println!();
    let summary = DailySummary::from_events(report.ledger.events(), report.config.engine.risk.contract_multiplier);
    print!("{}", summary.render());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backtest_overrides(args: &[&str]) -> RunOverrides {
        let argv = ["optionlab", "backtest", "--synthetic", "50"].iter().chain(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Backtest { overrides, .. } => overrides.to_overrides(),
            _ => panic!("expected backtest"),
        }
    }

    #[test]
    fn no_flags_override_nothing() {
        assert_eq!(backtest_overrides(&[]), RunOverrides::default());
    }

    #[test]
    fn toggle_flags_only_turn_features_off() {
        let o = backtest_overrides(&["--no-ml", "--no-risk-management"]);
        assert_eq!(o.ml, Some(false));
        assert_eq!(o.news, None);
        assert_eq!(o.risk_management, Some(false));
    }

    #[test]
    fn numeric_overrides_parse() {
        let o = backtest_overrides(&["--iv-threshold", "0.3", "--end-buffer-minutes", "15"]);
        assert_eq!(o.iv_threshold, Some(0.3));
        assert_eq!(o.end_buffer_minutes, Some(15));
    }

    #[test]
    fn sweep_axes_split_on_commas() {
        let cli = Cli::try_parse_from(["optionlab", "sweep", "--synthetic", "50", "--iv-thresholds", "0.2,0.3"]).unwrap();
        match cli.command {
            Commands::Sweep { iv_thresholds, top, .. } => {
                assert_eq!(iv_thresholds, vec![0.2, 0.3]);
                assert_eq!(top, 5);
            }
            _ => panic!("expected sweep"),
        }
    }
}
