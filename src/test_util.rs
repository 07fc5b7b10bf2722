use chrono::{Days, NaiveDate};

use crate::model::{PriceBar, PriceHistory};

/// Asserts that two `f64` values are within `1e-9` of each other.
macro_rules! assert_close {
    ($actual:expr, $expected:expr) => {{
        let (a, e): (f64, f64) = ($actual, $expected);
        assert!(
            (a - e).abs() < 1e-9,
            "assert_close failed: actual={a}, expected={e}, diff={}",
            (a - e).abs(),
        );
    }};
}

pub(crate) use assert_close;

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.checked_add_days(Days::new(i as u64)))
        .expect("valid test date")
}

/// History where open, high, low and close all equal the given close.
pub fn history_from_closes(closes: &[f64]) -> PriceHistory {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PriceBar {
            date: day(i),
            open: c,
            high: c,
            low: c,
            close: c,
            volume: 1.0,
        })
        .collect();
    PriceHistory::new("TEST", bars)
}

/// History from `(high, low, close)` triples; open equals close.
pub fn history_from_hlc(rows: &[(f64, f64, f64)]) -> PriceHistory {
    let bars = rows
        .iter()
        .enumerate()
        .map(|(i, &(high, low, close))| PriceBar {
            date: day(i),
            open: close,
            high,
            low,
            close,
            volume: 1.0,
        })
        .collect();
    PriceHistory::new("TEST", bars)
}

/// History from parallel close and volume columns.
pub fn history_with_volumes(closes: &[f64], volumes: &[f64]) -> PriceHistory {
    let bars = closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&c, &v))| PriceBar {
            date: day(i),
            open: c,
            high: c,
            low: c,
            close: c,
            volume: v,
        })
        .collect();
    PriceHistory::new("TEST", bars)
}

/// A deterministic zig-zag series with real highs and lows around the close.
pub fn wavy_history(len: usize) -> PriceHistory {
    let rows: Vec<(f64, f64, f64)> = (0..len)
        .map(|i| {
            let x = i as f64;
            let close = 100.0 + 10.0 * (x * 0.7).sin() + 0.3 * x;
            (close + 1.5, close - 1.5, close)
        })
        .collect();
    history_from_hlc(&rows)
}
