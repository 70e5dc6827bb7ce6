//! Position Lifecycle Engine.
//!
//! One [`SymbolLifecycle`] state machine per symbol (FLAT → OPEN → CLOSED),
//! and a [`LifecycleBook`] that serialises access per symbol so different
//! symbols can be driven from different threads.

pub mod book;
pub mod engine;
pub mod ratchet;

pub use book::LifecycleBook;
pub use engine::{AcceptOutcome, LifecycleError, LifecycleSettings, SymbolLifecycle};
pub use ratchet::{RatchetState, StopSide};
