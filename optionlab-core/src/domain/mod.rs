//! Domain types for the options pipeline.

pub mod bar;
pub mod fill;
pub mod instrument;
pub mod order;
pub mod position;
pub mod snapshot;
pub mod trade;

pub use bar::Bar;
pub use fill::Fill;
pub use instrument::{next_friday, OptionContract, OptionRight};
pub use order::{Exposure, IntentError, LegSide, OrderIntent, OrderLeg};
pub use position::{Position, PositionState};
pub use snapshot::MarketSnapshot;
pub use trade::{TradeEvent, TradeEventKind};

/// Symbol type alias
pub type Symbol = String;
