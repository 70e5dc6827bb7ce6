//! Outbound alert throttling.

pub mod rate_limiter;

pub use rate_limiter::{AlertBudget, AlertDecision, AlertRateLimiter};
