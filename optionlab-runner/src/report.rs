//! Report export: JSON, CSV and a plain-text summary.
//!
//! `report.json` carries a `schema_version`; newer versions are rejected on
//! load.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use optionlab_core::domain::{TradeEvent, TradeEventKind};
use optionlab_core::ledger::EquityPoint;

use crate::backtest::{BacktestReport, SCHEMA_VERSION};

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(report: &BacktestReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize BacktestReport to JSON")
}

pub fn import_json(json: &str) -> Result<BacktestReport> {
    let report: BacktestReport =
        serde_json::from_str(json).context("failed to deserialize BacktestReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV ────────────────────────────────────────────────────────────

/// One row per trade event.
///
/// Columns: timestamp, symbol, kind, variant, price, quantity, realized_pnl
pub fn export_trades_csv(events: &[TradeEvent]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "symbol", "kind", "variant", "price", "quantity", "realized_pnl"])?;
    for e in events {
        let timestamp = e.timestamp.to_rfc3339();
        let price = format!("{:.4}", e.price);
        let quantity = e.quantity.to_string();
        let pnl = e.realized_pnl.map(|p| format!("{p:.2}")).unwrap_or_default();
        wtr.write_record([
            timestamp.as_str(),
            e.symbol.as_str(),
            e.kind.as_str(),
            e.variant.name(),
            price.as_str(),
            quantity.as_str(),
            pnl.as_str(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_equity_csv(curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity", "realized_pnl"])?;
    for p in curve {
        wtr.write_record([
            &p.timestamp.to_rfc3339(),
            &format!("{:.2}", p.equity),
            &format!("{:.2}", p.realized_pnl),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Summary ────────────────────────────────────────────────────────

/// Trades by strategy, events by kind, notional and realized P/L.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// `None` when the summary spans every date.
    pub date: Option<NaiveDate>,
    pub trades_by_strategy: BTreeMap<String, usize>,
    pub events_by_kind: BTreeMap<String, usize>,
    pub total_notional: f64,
    pub realized_pnl: f64,
    pub winners: usize,
    pub losers: usize,
}

impl DailySummary {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a TradeEvent>, contract_multiplier: f64) -> Self {
        let mut s = DailySummary::default();
        for e in events {
            *s.events_by_kind.entry(e.kind.as_str().to_string()).or_default() += 1;
            if e.kind == TradeEventKind::Opened {
                *s.trades_by_strategy.entry(e.variant.name().to_string()).or_default() += 1;
            }
            if e.kind != TradeEventKind::TrailingAdjusted {
                s.total_notional += e.notional(contract_multiplier);
            }
            if let Some(pnl) = e.realized_pnl {
                s.realized_pnl += pnl;
                if pnl > 0.0 {
                    s.winners += 1;
                } else {
                    s.losers += 1;
                }
            }
        }
        s
    }

    /// Events whose UTC date is `date`.
    pub fn for_date(events: &[TradeEvent], date: NaiveDate, contract_multiplier: f64) -> Self {
        let mut s = Self::from_events(
            events.iter().filter(|e| e.timestamp.date_naive() == date),
            contract_multiplier,
        );
        s.date = Some(date);
        s
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(512);
        match self.date {
            Some(d) => {
                let _ = writeln!(out, "Trading summary for {d}");
            }
            None => out.push_str("Trading summary\n"),
        }
        out.push('\n');

        out.push_str("Trades by strategy:\n");
        if self.trades_by_strategy.is_empty() {
            out.push_str("  (none)\n");
        }
        for (name, n) in &self.trades_by_strategy {
            let _ = writeln!(out, "  {name:<20} {n}");
        }

        out.push_str("\nEvents:\n");
        for (kind, n) in &self.events_by_kind {
            let _ = writeln!(out, "  {kind:<20} {n}");
        }

        let _ = writeln!(out, "\nTotal notional: {:.2}", self.total_notional);
        let _ = writeln!(out, "Realized P/L:   {:+.2}", self.realized_pnl);
        let _ = writeln!(out, "Winners/losers: {}/{}", self.winners, self.losers);
        out
    }
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write `report.json`, `trades.csv`, `equity.csv` and `summary.txt` into
/// `{output_dir}/run_{run_id prefix}/`. Returns the directory.
pub fn save_artifacts(report: &BacktestReport, output_dir: &Path) -> Result<PathBuf> {
    let prefix: String = report.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(format!("run_{prefix}"));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(report.ledger.events())?)?;
    std::fs::write(run_dir.join("equity.csv"), export_equity_csv(&report.equity_curve)?)?;

    let summary = DailySummary::from_events(report.ledger.events(), report.config.engine.risk.contract_multiplier);
    std::fs::write(run_dir.join("summary.txt"), summary.render())?;

    Ok(run_dir)
}

pub fn load_artifacts(dir: &Path) -> Result<BacktestReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
