pub mod file;
pub mod yahoo;

use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Days, Months, NaiveDate};
use error_stack::{Report, bail};
use futures::future::BoxFuture;

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::model::{PriceBar, PriceHistory};

use file::CsvSource;
use yahoo::YahooSource;

/// Provider of daily price history.
///
/// Uses `BoxFuture` so the trait stays object-safe (`dyn PriceSource`).
pub trait PriceSource: Send + Sync {
    fn provider(&self) -> &'static str;

    /// Fetch daily bars for `symbol` covering `period` back from today.
    ///
    /// The returned history is sorted by date with no duplicate dates.
    fn fetch_history(
        &self,
        symbol: &str,
        period: Period,
    ) -> BoxFuture<'_, Result<PriceHistory, Report<SourceError>>>;
}

/// Lookback window for a fetch, written like `"10y"`, `"6mo"`, `"30d"` or
/// `"max"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Days(u32),
    Months(u32),
    Years(u32),
    Max,
}

impl Period {
    pub fn parse(s: &str) -> Result<Self, Report<SourceError>> {
        let invalid = || SourceError::InvalidPeriod {
            period: s.to_owned(),
        };
        let s = s.trim();
        if s == "max" {
            return Ok(Self::Max);
        }

        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (count, unit) = s.split_at(split);
        let count: u32 = match count.parse() {
            Ok(n) if n > 0 => n,
            _ => bail!(invalid()),
        };
        match unit {
            "d" => Ok(Self::Days(count)),
            "mo" => Ok(Self::Months(count)),
            "y" => Ok(Self::Years(count)),
            _ => bail!(invalid()),
        }
    }

    /// First calendar date covered when looking back from `today`.
    ///
    /// `None` means no lower bound.
    pub fn start(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Days(n) => today.checked_sub_days(Days::new(u64::from(n))),
            Self::Months(n) => today.checked_sub_months(Months::new(n)),
            Self::Years(n) => today.checked_sub_months(Months::new(n.saturating_mul(12))),
            Self::Max => None,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Days(n) => write!(f, "{n}d"),
            Self::Months(n) => write!(f, "{n}mo"),
            Self::Years(n) => write!(f, "{n}y"),
            Self::Max => write!(f, "max"),
        }
    }
}

/// Sort bars by date and keep the last bar for any repeated date.
pub fn normalize(symbol: &str, mut bars: Vec<PriceBar>) -> Result<PriceHistory, Report<SourceError>> {
    bars.sort_by_key(|b| b.date);
    let mut unique: Vec<PriceBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match unique.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => unique.push(bar),
        }
    }
    if unique.is_empty() {
        bail!(SourceError::Empty {
            symbol: symbol.to_owned(),
        });
    }
    Ok(PriceHistory::new(symbol, unique))
}

/// Build the configured price source.
pub fn build_source(config: &SourceConfig) -> Arc<dyn PriceSource> {
    match config.provider.as_str() {
        "csv" => Arc::new(CsvSource::new(PathBuf::from(&config.csv_dir))),
        _ => {
            let rate = NonZeroU32::new(config.requests_per_second)
                .unwrap_or(nonzero_ext::nonzero!(2u32));
            Arc::new(YahooSource::new(rate))
        }
    }
}
