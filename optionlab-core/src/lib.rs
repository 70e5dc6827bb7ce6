//! OptionLab core: decision-and-risk pipeline for options strategies.
//!
//! - Domain types (snapshots, bars, order intents, positions, trade events)
//! - Strategy Selector: metrics → variant → multi-leg order intent
//! - Risk Manager: sizing, ATR stops and targets, trailing parameters
//! - Confidence Gate: news veto and ML threshold
//! - Position Lifecycle Engine: per-symbol state machine over bars
//! - Alert Rate Limiter: per-channel fixed-window throttle
//!
//! Nothing here performs I/O or installs a tracing subscriber. Collaborators
//! are reached through the traits in [`providers`].

pub mod alerts;
pub mod config;
pub mod domain;
pub mod error;
pub mod gate;
pub mod indicators;
pub mod ledger;
pub mod lifecycle;
pub mod providers;
pub mod risk;
pub mod strategy;
pub mod time_filter;

pub use config::{ConfigError, EngineConfig};
pub use error::PipelineError;
