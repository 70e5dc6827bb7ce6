//! Pipeline error taxonomy.
//!
//! Gate vetoes, NoTrade and rate-limit denials are outcomes, not errors, and
//! never appear here.

use thiserror::Error;

use crate::lifecycle::LifecycleError;
use crate::strategy::StrategyVariant;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// Missing or invalid snapshot or bar. The tick for this symbol is skipped.
    #[error("input unavailable for {symbol}: {reason}")]
    InputUnavailable { symbol: String, reason: String },

    /// A stub strategy was selected. Never downgraded to another variant.
    #[error("strategy '{0}' is not implemented")]
    NotImplementedStrategy(StrategyVariant),

    /// Corrupted per-symbol state. Aborts the run.
    #[error("invariant violation for {symbol}: {detail}")]
    InvariantViolation { symbol: String, detail: String },
}

impl PipelineError {
    pub fn input_unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::InputUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// Whether the run must stop rather than skip this symbol.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::InvariantViolation { .. })
    }
}

impl From<LifecycleError> for PipelineError {
    fn from(err: LifecycleError) -> Self {
        PipelineError::InvariantViolation {
            symbol: err.symbol().to_string(),
            detail: err.to_string(),
        }
    }
}
