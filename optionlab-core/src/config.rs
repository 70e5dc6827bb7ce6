//! Engine configuration: one immutable struct passed into every component.
//!
//! Every field has a default, so a partial TOML file (or an empty one) is a
//! valid configuration. Call [`EngineConfig::validate`] after loading.

use std::path::Path;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::strategy::StrategyVariant;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{field} = {value} is out of range ({expected})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub selector: SelectorConfig,
    pub risk: RiskConfig,
    pub gate: GateConfig,
    pub lifecycle: LifecycleConfig,
    pub alerts: AlertConfig,
    pub market_hours: MarketHoursConfig,
    pub news: NewsConfig,
    pub ml: MlConfig,
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.selector;
        non_negative("selector.iv_threshold", s.iv_threshold)?;
        fraction("selector.borderline_iv_ratio", s.borderline_iv_ratio)?;
        non_negative("selector.trend_deadband", s.trend_deadband)?;
        non_negative("selector.momentum_margin", s.momentum_margin)?;
        positive("selector.strike_width", s.strike_width)?;

        let r = &self.risk;
        if !(r.risk_fraction > 0.0 && r.risk_fraction <= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "risk.risk_fraction",
                value: r.risk_fraction,
                expected: "0 < x <= 1",
            });
        }
        positive("risk.stop_atr_multiplier", r.stop_atr_multiplier)?;
        positive("risk.target_atr_multiplier", r.target_atr_multiplier)?;
        non_negative("risk.trailing_activation_pct", r.trailing_activation_pct)?;
        if let Some(pct) = r.trailing_stop_pct {
            if !(pct > 0.0 && pct < 1.0) {
                return Err(ConfigError::OutOfRange {
                    field: "risk.trailing_stop_pct",
                    value: pct,
                    expected: "0 < x < 1",
                });
            }
        }
        positive("risk.volatility_ceiling", r.volatility_ceiling)?;
        positive("risk.worst_case_premium_multiple", r.worst_case_premium_multiple)?;
        positive("risk.contract_multiplier", r.contract_multiplier)?;

        fraction("gate.ml_confidence_threshold", self.gate.ml_confidence_threshold)?;

        if self.alerts.window_secs == 0 {
            return Err(ConfigError::Invalid("alerts.window_secs must be > 0".into()));
        }
        non_negative("alerts.min_notional", self.alerts.min_notional)?;

        let mh = &self.market_hours;
        if mh.open >= mh.close {
            return Err(ConfigError::Invalid(format!(
                "market_hours.open {} must be before close {}",
                mh.open, mh.close
            )));
        }
        if mh.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::OutOfRange {
                field: "market_hours.utc_offset_minutes",
                value: mh.utc_offset_minutes as f64,
                expected: "|x| < 1440",
            });
        }

        if !(-1.0..=1.0).contains(&self.news.sentiment_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "news.sentiment_threshold",
                value: self.news.sentiment_threshold,
                expected: "-1 <= x <= 1",
            });
        }

        if self.ml.weights.iter().any(|w| !w.is_finite()) || !self.ml.bias.is_finite() {
            return Err(ConfigError::Invalid("ml weights and bias must be finite".into()));
        }
        if !self.ml.weights.is_empty() && self.ml.weights.len() != crate::providers::Features::LEN {
            return Err(ConfigError::Invalid(format!(
                "ml.weights must have {} entries, got {}",
                crate::providers::Features::LEN,
                self.ml.weights.len()
            )));
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value, expected: "x > 0" })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value, expected: "x >= 0" })
    }
}

fn fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value, expected: "0 <= x <= 1" })
    }
}

// ── Selector ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// IV at or above this is the high-volatility regime.
    pub iv_threshold: f64,
    /// Low-IV readings at or above `iv_threshold × ratio` count as borderline.
    pub borderline_iv_ratio: f64,
    pub trend_deadband: f64,
    /// Opposing momentum suppresses trades whose trend is within this
    /// margin beyond the deadband.
    pub momentum_margin: f64,
    /// Prefer defined-risk structures when both are eligible.
    pub capital_preservation: bool,
    pub strike_width: f64,
    pub decision_table: DecisionTable,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            iv_threshold: 0.30,
            borderline_iv_ratio: 0.8,
            trend_deadband: 0.2,
            momentum_margin: 0.3,
            capital_preservation: false,
            strike_width: 2.0,
            decision_table: DecisionTable::default(),
        }
    }
}

/// Variant per (IV regime, trend) cell. `None` means no trade for that cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionTable {
    pub high_iv_flat: Option<StrategyVariant>,
    /// Used for `high_iv_flat` when capital preservation is on.
    pub high_iv_flat_preserve: Option<StrategyVariant>,
    pub high_iv_up: Option<StrategyVariant>,
    pub high_iv_down: Option<StrategyVariant>,
    pub low_iv_flat: Option<StrategyVariant>,
    pub low_iv_up: Option<StrategyVariant>,
    pub low_iv_up_borderline: Option<StrategyVariant>,
    pub low_iv_down: Option<StrategyVariant>,
    pub low_iv_down_borderline: Option<StrategyVariant>,
}

impl Default for DecisionTable {
    fn default() -> Self {
        Self {
            high_iv_flat: Some(StrategyVariant::Straddle),
            high_iv_flat_preserve: Some(StrategyVariant::IronCondor),
            high_iv_up: Some(StrategyVariant::BullCallSpread),
            high_iv_down: Some(StrategyVariant::BearPutSpread),
            low_iv_flat: Some(StrategyVariant::Straddle),
            low_iv_up: Some(StrategyVariant::LongCall),
            low_iv_up_borderline: Some(StrategyVariant::BullCallSpread),
            low_iv_down: Some(StrategyVariant::LongPut),
            low_iv_down_borderline: Some(StrategyVariant::BearPutSpread),
        }
    }
}

// ── Risk ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub risk_fraction: f64,
    pub stop_atr_multiplier: f64,
    pub target_atr_multiplier: f64,
    /// Favorable move (fraction of entry) before trailing engages.
    pub trailing_activation_pct: f64,
    /// `None` disables trailing stops.
    pub trailing_stop_pct: Option<f64>,
    /// ATR/price above which size is scaled down.
    pub volatility_ceiling: f64,
    pub max_contracts_per_symbol: u32,
    pub worst_case_premium_multiple: f64,
    pub contract_multiplier: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_fraction: 0.02,
            stop_atr_multiplier: 1.5,
            target_atr_multiplier: 3.0,
            trailing_activation_pct: 0.02,
            trailing_stop_pct: Some(0.05),
            volatility_ceiling: 0.03,
            max_contracts_per_symbol: 10,
            worst_case_premium_multiple: 1.0,
            contract_multiplier: 100.0,
        }
    }
}

// ── Gate ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub ml_enabled: bool,
    pub news_enabled: bool,
    pub ml_confidence_threshold: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            ml_enabled: true,
            news_enabled: true,
            ml_confidence_threshold: 0.6,
        }
    }
}

// ── Lifecycle ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Fill at the signal bar's close.
    #[default]
    Close,
    /// Fill at the next bar's open.
    NextOpen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub fill_policy: FillPolicy,
    pub exit_at_expiry: bool,
    pub flatten_end_of_day: bool,
    /// 0 disables the holding-period exit.
    pub max_holding_bars: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            fill_policy: FillPolicy::Close,
            exit_at_expiry: true,
            flatten_end_of_day: false,
            max_holding_bars: 0,
        }
    }
}

// ── Alerts ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub min_notional: f64,
    pub max_per_window: u32,
    pub window_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            min_notional: 1_000.0,
            max_per_window: 5,
            window_secs: 3_600,
        }
    }
}

// ── Market hours ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketHoursConfig {
    pub open: NaiveTime,
    pub close: NaiveTime,
    /// Exchange offset from UTC in minutes (−300 = US Eastern standard time).
    pub utc_offset_minutes: i32,
    pub end_buffer_minutes: u32,
}

impl Default for MarketHoursConfig {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
            utc_offset_minutes: -300,
            end_buffer_minutes: 10,
        }
    }
}

// ── News ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    /// Mean headline sentiment below this blocks trading.
    pub sentiment_threshold: f64,
    pub keywords: Vec<String>,
    pub lookahead_minutes: u32,
    pub headline_window_minutes: u32,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            sentiment_threshold: -0.3,
            keywords: ["halt", "bankruptcy", "downgrade", "investigation", "recall"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            lookahead_minutes: 60,
            headline_window_minutes: 240,
        }
    }
}

// ── ML ──

/// Logistic model coefficients. Empty `weights` means no model is loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlConfig {
    pub weights: Vec<f64>,
    pub bias: f64,
}
