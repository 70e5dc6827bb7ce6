//! Regular-session window at a fixed UTC offset.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Offset, Utc};

use crate::config::{ConfigError, MarketHoursConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct MarketHours {
    open: NaiveTime,
    close: NaiveTime,
    offset: FixedOffset,
    end_buffer: Duration,
}

impl MarketHours {
    pub fn from_config(config: &MarketHoursConfig) -> Result<Self, ConfigError> {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or(ConfigError::OutOfRange {
            field: "market_hours.utc_offset_minutes",
            value: config.utc_offset_minutes as f64,
            expected: "|x| < 1440",
        })?;
        Ok(Self {
            open: config.open,
            close: config.close,
            offset,
            end_buffer: Duration::minutes(config.end_buffer_minutes as i64),
        })
    }

    fn local_time(&self, ts: DateTime<Utc>) -> NaiveTime {
        ts.with_timezone(&self.offset).time()
    }

    fn buffer_start(&self) -> NaiveTime {
        if self.end_buffer >= self.close - self.open {
            return self.open;
        }
        self.close - self.end_buffer
    }

    /// Inside the session and before the end-of-day buffer.
    pub fn is_open(&self, ts: DateTime<Utc>) -> bool {
        let t = self.local_time(ts);
        t >= self.open && t < self.buffer_start()
    }

    /// Inside the final `end_buffer_minutes` of the session, or after close.
    pub fn in_end_of_day_buffer(&self, ts: DateTime<Utc>) -> bool {
        self.local_time(ts) >= self.buffer_start()
    }
}

impl Default for MarketHours {
    fn default() -> Self {
        let config = MarketHoursConfig::default();
        Self {
            open: config.open,
            close: config.close,
            offset: FixedOffset::east_opt(config.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix()),
            end_buffer: Duration::minutes(config.end_buffer_minutes as i64),
        }
    }
}
