//! Logistic confidence model.

use optionlab_core::config::MlConfig;
use optionlab_core::providers::{Features, MlProvider};

/// `sigmoid(w · x + b)` over [`Features::as_array`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogisticModel {
    weights: Vec<f64>,
    bias: f64,
}

impl LogisticModel {
    /// Weight count is checked by `EngineConfig::validate`. A mismatched
    /// vector here behaves as no model.
    pub fn from_config(config: &MlConfig) -> Self {
        Self {
            weights: config.weights.clone(),
            bias: config.bias,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.weights.len() == Features::LEN
    }
}

impl MlProvider for LogisticModel {
    fn predict_proba(&self, features: &Features) -> Option<f64> {
        if !self.is_loaded() {
            return None;
        }
        let z: f64 = self
            .weights
            .iter()
            .zip(features.as_array())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        Some(1.0 / (1.0 + (-z).exp()))
    }
}
