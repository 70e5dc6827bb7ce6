use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution price and time for an order entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    pub fn new(price: f64, timestamp: DateTime<Utc>) -> Self {
        Self { price, timestamp }
    }
}
