//! Strategy selection: market metrics → variant → multi-leg order intent.

pub mod legs;
pub mod selector;
pub mod variant;

pub use legs::{build_legs, LegPlan};
pub use selector::{choose_variant, classify, select, IvRegime, NoTradeReason, Selection, TrendDirection};
pub use variant::StrategyVariant;
