//! End-to-end scenarios through selector → risk → gate → lifecycle.

use chrono::{DateTime, Duration, TimeZone, Utc};
use optionlab_core::config::EngineConfig;
use optionlab_core::domain::{Bar, Fill, MarketSnapshot, TradeEventKind};
use optionlab_core::gate::{gate, GateVerdict};
use optionlab_core::lifecycle::{AcceptOutcome, LifecycleBook, LifecycleSettings};
use optionlab_core::risk::adjust;
use optionlab_core::strategy::{select, Selection, StrategyVariant};

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn bar(minutes: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        symbol: "SPY".into(),
        timestamp: t(minutes),
        open,
        high,
        low,
        close,
        volume: 10_000.0,
    }
}

fn uptrend_snapshot() -> MarketSnapshot {
    MarketSnapshot {
        symbol: "SPY".into(),
        timestamp: t(0),
        price: 500.0,
        iv: 0.15,
        trend: 0.8,
        momentum: 0.6,
        atr: 2.0,
    }
}

#[test]
fn low_vol_uptrend_long_call_stops_out_at_a_loss() {
    let config = EngineConfig::default();
    assert_eq!(config.risk.risk_fraction, 0.02);
    assert_eq!(config.risk.stop_atr_multiplier, 1.5);

    let snapshot = uptrend_snapshot();
    let intent = match select(&snapshot, &config.selector).unwrap() {
        Selection::Trade(intent) => intent,
        other => panic!("expected a trade, got {other:?}"),
    };
    assert_eq!(intent.variant(), StrategyVariant::LongCall);

    let order = adjust(intent, &snapshot, 100_000.0, &config.risk);
    assert!(order.position_size() > 0);
    assert!((order.params.stop_loss_price - (snapshot.price - 3.0)).abs() < 1e-9);

    let gated = gate(order, None, false, &config.gate);
    assert_eq!(gated.verdict, GateVerdict::Passed);

    let book = LifecycleBook::new(LifecycleSettings::from_config(&config).unwrap());
    book.on_bar(&bar(0, 499.5, 500.5, 499.0, 500.0)).unwrap();
    let opened = book.accept(&gated.order, Fill::new(500.0, t(0))).unwrap();
    assert!(matches!(opened, AcceptOutcome::Opened(_)));

    let mut events = Vec::new();
    events.extend(book.on_bar(&bar(1, 500.0, 500.8, 499.2, 499.5)).unwrap());
    events.extend(book.on_bar(&bar(2, 499.5, 499.6, 496.5, 496.8)).unwrap());
    events.extend(book.on_bar(&bar(3, 496.8, 497.5, 495.0, 497.0)).unwrap());

    assert_eq!(events.len(), 1);
    let exit = &events[0];
    assert_eq!(exit.kind, TradeEventKind::StoppedOut);
    assert!((exit.price - 497.0).abs() < 1e-9);
    assert!(exit.realized_pnl.unwrap() < 0.0);
}

#[test]
fn news_veto_beats_confident_model() {
    let config = EngineConfig::default();
    let snapshot = uptrend_snapshot();
    let intent = select(&snapshot, &config.selector).unwrap().into_intent().unwrap();
    let order = adjust(intent, &snapshot, 100_000.0, &config.risk);
    assert!(order.position_size() > 0);

    let gated = gate(order, Some(0.95), true, &config.gate);
    assert_eq!(gated.verdict, GateVerdict::NewsVeto);
    assert_eq!(gated.order.position_size(), 0);

    // An inert order never opens a position.
    let book = LifecycleBook::new(LifecycleSettings::default());
    let out = book.accept(&gated.order, Fill::new(500.0, t(0))).unwrap();
    assert_eq!(out, AcceptOutcome::Inert);
}

#[test]
fn short_volatility_condor_stops_out_on_either_side() {
    let mut config = EngineConfig::default();
    config.selector.capital_preservation = true;
    let snapshot = MarketSnapshot {
        iv: 0.45,
        trend: 0.05,
        momentum: 0.0,
        ..uptrend_snapshot()
    };
    let intent = select(&snapshot, &config.selector).unwrap().into_intent().unwrap();
    assert_eq!(intent.variant(), StrategyVariant::IronCondor);

    let order = adjust(intent, &snapshot, 100_000.0, &config.risk);
    assert!(order.position_size() > 0);
    assert!(order.params.trailing.is_none());

    let book = LifecycleBook::new(LifecycleSettings::from_config(&config).unwrap());
    book.accept(&order, Fill::new(500.0, t(0))).unwrap();
    // Band is 500 ± 3; a rally through 503 is a loss for short volatility.
    let events = book.on_bar(&bar(1, 500.5, 503.5, 500.0, 503.2)).unwrap();
    assert_eq!(events[0].kind, TradeEventKind::StoppedOut);
    assert_eq!(events[0].price, 503.0);
    assert!(events[0].realized_pnl.unwrap() < 0.0);
}
