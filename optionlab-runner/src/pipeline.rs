//! One evaluation of the decision pipeline for a single snapshot.
//!
//! `select → adjust → gate`, with the ML and news collaborators consulted
//! only when their sub-gate is enabled.

use optionlab_core::config::EngineConfig;
use optionlab_core::domain::MarketSnapshot;
use optionlab_core::gate::{gate, GateOutcome};
use optionlab_core::providers::{Features, MlProvider, NewsProvider};
use optionlab_core::risk::{adjust, RiskAdjustedOrder};
use optionlab_core::strategy::{select, NoTradeReason, Selection};
use optionlab_core::PipelineError;

#[derive(Debug, Clone, PartialEq)]
pub enum TickDecision {
    NoTrade(NoTradeReason),
    /// Gate did not pass. The order inside is inert.
    Blocked(GateOutcome),
    Ready(RiskAdjustedOrder),
}

impl TickDecision {
    pub fn order(&self) -> Option<&RiskAdjustedOrder> {
        match self {
            TickDecision::Ready(order) => Some(order),
            _ => None,
        }
    }
}

/// Borrowed confidence collaborators.
#[derive(Clone, Copy)]
pub struct Advisors<'a> {
    pub ml: &'a dyn MlProvider,
    pub news: &'a dyn NewsProvider,
}

pub fn evaluate(
    snapshot: &MarketSnapshot,
    account_equity: f64,
    config: &EngineConfig,
    advisors: Advisors<'_>,
) -> Result<TickDecision, PipelineError> {
    let intent = match select(snapshot, &config.selector)? {
        Selection::Trade(intent) => intent,
        Selection::NoTrade(reason) => return Ok(TickDecision::NoTrade(reason)),
    };

    let days_to_expiry = (intent.nearest_expiry() - snapshot.timestamp.date_naive()).num_days() as f64;
    let order = adjust(intent, snapshot, account_equity, &config.risk);

    let news_blocked = config.gate.news_enabled && advisors.news.is_blocked(&snapshot.symbol, snapshot.timestamp);
    let probability = if config.gate.ml_enabled && !news_blocked {
        advisors
            .ml
            .predict_proba(&Features::from_snapshot(snapshot, days_to_expiry))
    } else {
        None
    };

    let outcome = gate(order, probability, news_blocked, &config.gate);
    if outcome.verdict.is_pass() {
        Ok(TickDecision::Ready(outcome.order))
    } else {
        Ok(TickDecision::Blocked(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use optionlab_core::gate::GateVerdict;
    use optionlab_core::providers::{NoModel, NoNews};
    use optionlab_core::strategy::StrategyVariant;

    struct Fixed(f64);

    impl MlProvider for Fixed {
        fn predict_proba(&self, _: &Features) -> Option<f64> {
            Some(self.0)
        }
    }

    struct Blocked;

    impl NewsProvider for Blocked {
        fn is_blocked(&self, _: &str, _: DateTime<Utc>) -> bool {
            true
        }
    }

    fn snapshot(iv: f64, trend: f64, momentum: f64) -> MarketSnapshot {
        MarketSnapshot {
            symbol: "SPY".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap(),
            price: 100.0,
            iv,
            trend,
            momentum,
            atr: 2.0,
        }
    }

    fn quiet() -> Advisors<'static> {
        Advisors {
            ml: &NoModel,
            news: &NoNews,
        }
    }

    #[test]
    fn uptrend_is_ready_to_submit() {
        let decision = evaluate(&snapshot(0.15, 0.8, 0.6), 100_000.0, &EngineConfig::default(), quiet()).unwrap();
        let order = decision.order().expect("ready");
        assert_eq!(order.intent.variant(), StrategyVariant::LongCall);
        assert_eq!(order.position_size(), 10);
    }

    #[test]
    fn nan_iv_is_no_trade() {
        let decision = evaluate(&snapshot(f64::NAN, 0.8, 0.6), 100_000.0, &EngineConfig::default(), quiet()).unwrap();
        assert!(matches!(decision, TickDecision::NoTrade(_)));
    }

    #[test]
    fn low_probability_blocks() {
        let advisors = Advisors {
            ml: &Fixed(0.4),
            news: &NoNews,
        };
        let decision = evaluate(&snapshot(0.15, 0.8, 0.6), 100_000.0, &EngineConfig::default(), advisors).unwrap();
        match decision {
            TickDecision::Blocked(outcome) => {
                assert!(matches!(outcome.verdict, GateVerdict::MlBelowThreshold { .. }));
                assert!(outcome.order.is_inert());
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn disabled_news_gate_ignores_provider() {
        let mut config = EngineConfig::default();
        config.gate.news_enabled = false;
        let advisors = Advisors {
            ml: &NoModel,
            news: &Blocked,
        };
        let decision = evaluate(&snapshot(0.15, 0.8, 0.6), 100_000.0, &config, advisors).unwrap();
        assert!(decision.order().is_some());
    }

    #[test]
    fn news_block_wins() {
        let advisors = Advisors {
            ml: &Fixed(0.99),
            news: &Blocked,
        };
        let decision = evaluate(&snapshot(0.15, 0.8, 0.6), 100_000.0, &EngineConfig::default(), advisors).unwrap();
        assert!(matches!(
            decision,
            TickDecision::Blocked(GateOutcome {
                verdict: GateVerdict::NewsVeto,
                ..
            })
        ));
    }

    #[test]
    fn stub_variant_from_table_is_an_error() {
        let mut config = EngineConfig::default();
        config.selector.decision_table.low_iv_up = Some(StrategyVariant::Collar);
        let err = evaluate(&snapshot(0.15, 0.8, 0.6), 100_000.0, &config, quiet()).unwrap_err();
        assert_eq!(err, PipelineError::NotImplementedStrategy(StrategyVariant::Collar));
    }
}
