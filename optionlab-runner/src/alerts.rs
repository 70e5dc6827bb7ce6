//! Trade alert dispatch.
//!
//! Every trade event is priced, checked against the channel's rate limiter
//! and only then handed to the notifier. A notifier failure is logged and
//! reported; it never affects positions.

use std::sync::Arc;

use tracing::{info, warn};

use optionlab_core::alerts::{AlertDecision, AlertRateLimiter};
use optionlab_core::config::AlertConfig;
use optionlab_core::domain::TradeEvent;
use optionlab_core::providers::{Notifier, NotifyError};

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Sent,
    Suppressed(AlertDecision),
    Failed(NotifyError),
}

pub struct AlertDispatcher {
    limiter: AlertRateLimiter,
    notifier: Arc<dyn Notifier>,
    channel: String,
    contract_multiplier: f64,
}

impl AlertDispatcher {
    pub fn new(
        config: &AlertConfig,
        notifier: Arc<dyn Notifier>,
        channel: impl Into<String>,
        contract_multiplier: f64,
    ) -> Self {
        Self {
            limiter: AlertRateLimiter::new(config),
            notifier,
            channel: channel.into(),
            contract_multiplier,
        }
    }

    pub fn limiter(&self) -> &AlertRateLimiter {
        &self.limiter
    }

    pub fn dispatch(&self, event: &TradeEvent) -> DispatchOutcome {
        let notional = event.notional(self.contract_multiplier);
        let decision = self.limiter.check(&self.channel, notional, event.timestamp);
        if !decision.is_allowed() {
            return DispatchOutcome::Suppressed(decision);
        }
        match self.notifier.send(&self.channel, &format_alert(event, notional)) {
            Ok(()) => DispatchOutcome::Sent,
            Err(e) => {
                warn!(symbol = %event.symbol, channel = %self.channel, error = %e, "alert delivery failed");
                DispatchOutcome::Failed(e)
            }
        }
    }

    pub fn dispatch_all<'a>(&self, events: impl IntoIterator<Item = &'a TradeEvent>) -> Vec<DispatchOutcome> {
        events.into_iter().map(|e| self.dispatch(e)).collect()
    }
}

/// One-line alert body.
pub fn format_alert(event: &TradeEvent, notional: f64) -> String {
    let mut msg = format!(
        "[{}] {} {} {} x{} @ {:.2} (notional {:.0})",
        event.timestamp.format("%Y-%m-%d %H:%M"),
        event.symbol,
        event.kind,
        event.variant,
        event.quantity,
        event.price,
        notional,
    );
    if let Some(pnl) = event.realized_pnl {
        msg.push_str(&format!(" pnl {pnl:+.2}"));
    }
    msg
}

/// Writes alerts to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, channel: &str, message: &str) -> Result<(), NotifyError> {
        info!(channel, "{message}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use optionlab_core::domain::TradeEventKind;
    use optionlab_core::strategy::StrategyVariant;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
    }

    impl Notifier for Recorder {
        fn send(&self, _channel: &str, message: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    struct Broken;

    impl Notifier for Broken {
        fn send(&self, channel: &str, _message: &str) -> Result<(), NotifyError> {
            Err(NotifyError {
                channel: channel.to_string(),
                reason: "smtp down".into(),
            })
        }
    }

    fn t(mins: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap() + Duration::minutes(mins)
    }

    fn event(quantity: u32, at: DateTime<Utc>) -> TradeEvent {
        TradeEvent {
            symbol: "SPY".into(),
            kind: TradeEventKind::Opened,
            variant: StrategyVariant::LongCall,
            price: 500.0,
            quantity,
            timestamp: at,
            realized_pnl: None,
        }
    }

    fn config(max: u32) -> AlertConfig {
        AlertConfig {
            min_notional: 1_000.0,
            max_per_window: max,
            window_secs: 3600,
        }
    }

    #[test]
    fn sends_until_budget_exhausted() {
        let rec = Arc::new(Recorder::default());
        let d = AlertDispatcher::new(&config(2), rec.clone(), "trades", 100.0);
        let outcomes = d.dispatch_all(&[event(1, t(0)), event(1, t(1)), event(1, t(2))]);
        assert_eq!(
            outcomes,
            vec![
                DispatchOutcome::Sent,
                DispatchOutcome::Sent,
                DispatchOutcome::Suppressed(AlertDecision::RateLimited)
            ]
        );
        assert_eq!(rec.sent.lock().unwrap().len(), 2);
        assert_eq!(d.dispatch(&event(1, t(61))), DispatchOutcome::Sent);
    }

    #[test]
    fn notional_uses_multiplier() {
        let rec = Arc::new(Recorder::default());
        // 5 × 1 × 100 = 500 < 1000
        let d = AlertDispatcher::new(&config(5), rec.clone(), "trades", 100.0);
        let mut cheap = event(1, t(0));
        cheap.price = 5.0;
        assert_eq!(d.dispatch(&cheap), DispatchOutcome::Suppressed(AlertDecision::BelowMinNotional));
        assert!(rec.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn notifier_failure_is_reported_and_consumes_budget() {
        let d = AlertDispatcher::new(&config(1), Arc::new(Broken), "trades", 100.0);
        assert!(matches!(d.dispatch(&event(1, t(0))), DispatchOutcome::Failed(_)));
        assert_eq!(d.limiter().budget("trades").unwrap().count, 1);
    }

    #[test]
    fn message_includes_pnl_on_close() {
        let mut e = event(2, t(0));
        e.kind = TradeEventKind::StoppedOut;
        e.realized_pnl = Some(-300.0);
        let msg = format_alert(&e, 100_000.0);
        assert!(msg.contains("SPY"));
        assert!(msg.contains("stopped_out"));
        assert!(msg.contains("pnl -300.00"));
    }
}
