//! Serializable run configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use optionlab_core::config::{ConfigError, EngineConfig};
use optionlab_core::indicators::MetricsParams;

/// Unique identifier for a run (content-addressable hash).
pub type RunId = String;

/// Everything needed to reproduce a backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Symbols to trade. Empty means every symbol in the loaded data.
    pub symbols: Vec<String>,
    /// Capital each symbol is sized against.
    pub initial_capital: f64,
    /// Only open positions inside the regular session.
    pub session_filter: bool,
    /// Notifier channel for trade alerts.
    pub alert_channel: String,
    /// Bars before the first entry. 0 means the metrics lookback.
    pub warmup_bars: usize,
    /// Worker threads across symbols. 0 lets rayon decide.
    pub threads: usize,
    pub metrics: MetricsParams,
    pub engine: EngineConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            initial_capital: 100_000.0,
            session_filter: true,
            alert_channel: "trades".to_string(),
            warmup_bars: 0,
            threads: 0,
            metrics: MetricsParams::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(s)?;
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
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "initial_capital",
                value: self.initial_capital,
                expected: "x > 0",
            });
        }
        let m = &self.metrics;
        if m.atr_period == 0 || m.sma_period == 0 || m.momentum_period == 0 || m.volatility_lookback < 2 {
            return Err(ConfigError::Invalid(
                "metrics periods must be positive and volatility_lookback >= 2".into(),
            ));
        }
        self.engine.validate()
    }

    /// Effective warmup: never shorter than the metrics lookback.
    pub fn warmup(&self) -> usize {
        self.warmup_bars.max(self.metrics.warmup())
    }

    /// Deterministic hash of the configuration.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> RunId {
        let bytes = serde_json::to_vec(self).unwrap_or_else(|_| format!("{self:?}").into_bytes());
        blake3::hash(&bytes).to_hex().to_string()
    }
}

/// Command-line or sweep overrides applied on top of a loaded [`RunConfig`].
///
/// `None` keeps the loaded value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunOverrides {
    pub iv_threshold: Option<f64>,
    pub end_buffer_minutes: Option<u32>,
    pub initial_capital: Option<f64>,
    pub ml: Option<bool>,
    pub news: Option<bool>,
    /// `Some(false)` turns off trailing stops and the end-of-day flatten.
    /// Stops and targets always apply.
    pub risk_management: Option<bool>,
}

impl RunOverrides {
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(iv) = self.iv_threshold {
            config.engine.selector.iv_threshold = iv;
        }
        if let Some(minutes) = self.end_buffer_minutes {
            config.engine.market_hours.end_buffer_minutes = minutes;
        }
        if let Some(capital) = self.initial_capital {
            config.initial_capital = capital;
        }
        if let Some(ml) = self.ml {
            config.engine.gate.ml_enabled = ml;
        }
        if let Some(news) = self.news {
            config.engine.gate.news_enabled = news;
        }
        if self.risk_management == Some(false) {
            config.engine.risk.trailing_stop_pct = None;
            config.engine.lifecycle.flatten_end_of_day = false;
        }
    }
}
