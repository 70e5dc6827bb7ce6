//! Property tests for runner components.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use optionlab_runner::{parse_bars_csv, synthetic_bars, Backoff, DailySummary};

// ── 1. Backoff stays within its cap plus jitter ──

proptest! {
    #[test]
    fn backoff_never_exceeds_cap(
        base_ms in 1u64..1_000,
        max_ms in 1u64..10_000,
        jitter in 0.0f64..1.0,
        steps in 1usize..40,
    ) {
        let mut b = Backoff::new(Duration::from_millis(base_ms), Duration::from_millis(max_ms), jitter);
        let cap = Duration::from_millis(max_ms).as_secs_f64();
        for _ in 0..steps {
            let d = b.next_delay().as_secs_f64();
            prop_assert!(d <= cap * (1.0 + jitter) + 1e-6, "delay {d} above cap {cap}");
        }
        prop_assert_eq!(b.attempt() as usize, steps);
    }
}

// ── 2. CSV loading keeps every row ──

proptest! {
    #[test]
    fn csv_round_trip_keeps_all_bars(n in 1usize..60, symbols in 1usize..4) {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap();
        let names = ["SPY", "QQQ", "IWM"];
        let mut text = String::from("symbol,timestamp,open,high,low,close,volume\n");
        for name in &names[..symbols] {
            for b in synthetic_bars(name, start, n) {
                text.push_str(&format!(
                    "{},{},{},{},{},{},{}\n",
                    b.symbol,
                    b.timestamp.to_rfc3339(),
                    b.open,
                    b.high,
                    b.low,
                    b.close,
                    b.volume
                ));
            }
        }
        let set = parse_bars_csv(text.as_bytes()).unwrap();
        prop_assert_eq!(set.len(), symbols);
        for bars in set.values() {
            prop_assert_eq!(bars.len(), n);
            prop_assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        }
    }
}

// ── 3. Summary counts every event once ──

proptest! {
    #[test]
    fn summary_counts_all_events(n in 0usize..80) {
        use optionlab_core::domain::{TradeEvent, TradeEventKind};
        use optionlab_core::strategy::StrategyVariant;

        let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap();
        let events: Vec<TradeEvent> = (0..n)
            .map(|i| TradeEvent {
                symbol: "SPY".into(),
                kind: TradeEventKind::ALL[i % TradeEventKind::ALL.len()],
                variant: StrategyVariant::LongCall,
                price: 100.0,
                quantity: 1,
                timestamp: t0 + chrono::Duration::minutes(i as i64),
                realized_pnl: None,
            })
            .collect();
        let s = DailySummary::from_events(&events, 100.0);
        prop_assert_eq!(s.events_by_kind.values().sum::<usize>(), n);
    }
}
