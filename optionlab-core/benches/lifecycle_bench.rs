//! Criterion benchmarks for pipeline hot paths.
//!
//! 1. Lifecycle on_bar over a long bar series with an open trailing position
//! 2. Selector + risk manager on one snapshot
//! 3. Snapshot computation from bar history

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use optionlab_core::config::EngineConfig;
use optionlab_core::domain::{Bar, Fill, MarketSnapshot, OptionContract, OptionRight, OrderIntent, OrderLeg};
use optionlab_core::indicators::{snapshot_from_bars, MetricsParams};
use optionlab_core::lifecycle::{LifecycleSettings, SymbolLifecycle};
use optionlab_core::risk::{adjust, RiskAdjustedOrder, RiskParams, TrailingStop};
use optionlab_core::strategy::{select, StrategyVariant};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2020, 1, 2, 15, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0 + i as f64 * 0.01;
            Bar {
                symbol: "SPY".into(),
                timestamp: base + Duration::minutes(i as i64),
                open: close - 0.3,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 1_000_000.0,
            }
        })
        .collect()
}

fn wide_order() -> RiskAdjustedOrder {
    let ts = Utc.with_ymd_and_hms(2020, 1, 2, 15, 0, 0).unwrap();
    let expiry = NaiveDate::from_ymd_opt(2030, 1, 4).unwrap();
    let legs = vec![OrderLeg::buy(OptionContract::new("SPY", expiry, 100.0, OptionRight::Call))];
    RiskAdjustedOrder {
        intent: OrderIntent::new("SPY", StrategyVariant::LongCall, legs, ts).unwrap(),
        params: RiskParams {
            position_size: 5,
            stop_loss_price: 1.0,
            take_profit_price: 1_000_000.0,
            trailing: Some(TrailingStop {
                activation_pct: 0.01,
                trail_pct: 0.5,
            }),
            max_risk_amount: 0.0,
            reference_price: 100.0,
        },
    }
}

// ── 1. Lifecycle ─────────────────────────────────────────────────────

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle_on_bar");
    let settings = LifecycleSettings::default();
    let order = wide_order();
    for n in [1_000usize, 10_000] {
        let bars = make_bars(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &bars, |b, bars| {
            b.iter(|| {
                let mut lc = SymbolLifecycle::new("SPY");
                lc.accept(&order, Fill::new(bars[0].close, bars[0].timestamp)).unwrap();
                for bar in &bars[1..] {
                    black_box(lc.on_bar(bar, &settings).unwrap());
                }
                lc
            })
        });
    }
    group.finish();
}

// ── 2. Selection and sizing ──────────────────────────────────────────

fn bench_select_and_adjust(c: &mut Criterion) {
    let config = EngineConfig::default();
    let snapshot = MarketSnapshot {
        symbol: "SPY".into(),
        timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap(),
        price: 500.0,
        iv: 0.15,
        trend: 0.8,
        momentum: 0.6,
        atr: 2.0,
    };
    c.bench_function("select_and_adjust", |b| {
        b.iter(|| {
            let intent = select(black_box(&snapshot), &config.selector)
                .unwrap()
                .into_intent()
                .unwrap();
            adjust(intent, &snapshot, 100_000.0, &config.risk)
        })
    });
}

// ── 3. Snapshot from bars ────────────────────────────────────────────

fn bench_snapshot(c: &mut Criterion) {
    let bars = make_bars(250);
    let params = MetricsParams::default();
    c.bench_function("snapshot_from_250_bars", |b| {
        b.iter(|| snapshot_from_bars(black_box(&bars), &params).unwrap())
    });
}

criterion_group!(benches, bench_lifecycle, bench_select_and_adjust, bench_snapshot);
criterion_main!(benches);
