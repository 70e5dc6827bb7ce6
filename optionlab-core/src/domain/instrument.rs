use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionRight {
    Call,
    Put,
}

impl OptionRight {
    fn occ_letter(self) -> char {
        match self {
            OptionRight::Call => 'C',
            OptionRight::Put => 'P',
        }
    }
}

/// Listed option descriptor: underlying, expiry, strike and right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub underlying: String,
    pub expiry: NaiveDate,
    pub strike: f64,
    pub right: OptionRight,
}

impl OptionContract {
    pub fn new(underlying: impl Into<String>, expiry: NaiveDate, strike: f64, right: OptionRight) -> Self {
        Self {
            underlying: underlying.into(),
            expiry,
            strike,
            right,
        }
    }

    /// OCC symbol: `{UNDERLYING}{YYMMDD}{C|P}{strike * 1000, 8 digits}`.
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use optionlab_core::domain::{OptionContract, OptionRight};
    ///
    /// let c = OptionContract::new("SPY", NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(), 512.0, OptionRight::Call);
    /// assert_eq!(c.occ_symbol(), "SPY240308C00512000");
    /// ```
    pub fn occ_symbol(&self) -> String {
        let strike_milli = (self.strike * 1000.0).round() as u64;
        format!(
            "{}{}{}{:08}",
            self.underlying,
            self.expiry.format("%y%m%d"),
            self.right.occ_letter(),
            strike_milli
        )
    }
}

/// Next Friday strictly after `date` (a Friday maps to the following week).
pub fn next_friday(date: NaiveDate) -> NaiveDate {
    // Monday = 0 .. Friday = 4
    let weekday = date.weekday().num_days_from_monday() as i64;
    let mut days_ahead = 4 - weekday;
    if days_ahead <= 0 {
        days_ahead += 7;
    }
    date + Duration::days(days_ahead)
}
