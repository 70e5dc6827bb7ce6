//! Bar loading for the runner.
//!
//! CSV input has the header `symbol,timestamp,open,high,low,close,volume`
//! with RFC 3339 timestamps. Bars are grouped by symbol and sorted by time.
//! Duplicate timestamps are kept; the lifecycle engine rejects them.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use thiserror::Error;

use optionlab_core::domain::Bar;

/// Bars per symbol, ordered by symbol name.
pub type BarSet = BTreeMap<String, Vec<Bar>>;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bad row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: csv::Error,
    },
    #[error("no bars in input")]
    Empty,
}

pub fn load_bars_csv(path: impl AsRef<Path>) -> Result<BarSet, LoadError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_bars_csv(file)
}

pub fn parse_bars_csv(reader: impl Read) -> Result<BarSet, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut set = BarSet::new();
    for (i, record) in rdr.deserialize::<Bar>().enumerate() {
        // Row 1 is the header.
        let bar = record.map_err(|source| LoadError::Row { row: i + 2, source })?;
        set.entry(bar.symbol.clone()).or_default().push(bar);
    }
    if set.is_empty() {
        return Err(LoadError::Empty);
    }
    for bars in set.values_mut() {
        bars.sort_by_key(|b| b.timestamp);
    }
    Ok(set)
}

/// Deterministic random-walk daily bars for demos and tests.
///
/// One bar per weekday starting at `start`, seeded from the symbol name.
pub fn synthetic_bars(symbol: &str, start: DateTime<Utc>, count: usize) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::with_capacity(count);
    let mut price = 100.0_f64;
    let mut ts = start;
    while bars.len() < count {
        if matches!(ts.weekday(), Weekday::Sat | Weekday::Sun) {
            ts += Duration::days(1);
            continue;
        }
        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        bars.push(Bar {
            symbol: symbol.to_string(),
            timestamp: ts,
            open,
            high,
            low,
            close,
            volume: rng.gen_range(500_000.0..5_000_000.0),
        });
        price = close;
        ts += Duration::days(1);
    }
    bars
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = "\
symbol,timestamp,open,high,low,close,volume
QQQ,2024-03-05T15:00:00Z,400,402,399,401,1000
SPY,2024-03-05T15:00:00Z,500,502,499,501,2000
SPY,2024-03-04T15:00:00Z,498,501,497,500,1500
";

    #[test]
    fn groups_and_sorts_by_symbol() {
        let set = parse_bars_csv(SAMPLE.as_bytes()).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["QQQ", "SPY"]);
        let spy = &set["SPY"];
        assert_eq!(spy.len(), 2);
        assert!(spy[0].timestamp < spy[1].timestamp);
        assert_eq!(spy[0].close, 500.0);
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = parse_bars_csv("symbol,timestamp,open,high,low,close,volume\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::Empty));
    }

    #[test]
    fn bad_row_reports_line() {
        let input = "symbol,timestamp,open,high,low,close,volume\nSPY,not-a-time,1,1,1,1,1\n";
        let err = parse_bars_csv(input.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::Row { row: 2, .. }));
    }

    #[test]
    fn synthetic_is_deterministic_and_skips_weekends() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap();
        let a = synthetic_bars("SPY", start, 30);
        let b = synthetic_bars("SPY", start, 30);
        assert_eq!(a, b);
        assert_eq!(a.len(), 30);
        assert!(a.iter().all(|bar| bar.is_sane()));
        assert!(a.iter().all(|bar| !matches!(bar.timestamp.weekday(), Weekday::Sat | Weekday::Sun)));
        assert_ne!(a, synthetic_bars("QQQ", start, 30));
    }
}
