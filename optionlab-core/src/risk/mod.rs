//! Risk Manager: turns an order intent into a sized, bounded order.

pub mod manager;
pub mod params;
pub mod premium;

pub use manager::{adjust, bracket, size_contracts};
pub use params::{RiskAdjustedOrder, RiskParams, TrailingStop};
pub use premium::{atm_premium, per_contract_risk};
