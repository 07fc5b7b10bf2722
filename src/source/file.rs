use std::io::Read;
use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::info;

use crate::error::SourceError;
use crate::model::{PriceBar, PriceHistory};
use crate::source::{Period, PriceSource, normalize};

/// Daily bars from `{dir}/{SYMBOL}.csv` files.
///
/// The header must name `Date,Open,High,Low,Close,Volume`; other columns (for
/// example `Dividends` in yfinance exports) are ignored.
pub struct CsvSource {
    dir: PathBuf,
}

impl CsvSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl PriceSource for CsvSource {
    fn provider(&self) -> &'static str {
        "csv"
    }

    fn fetch_history(
        &self,
        symbol: &str,
        period: Period,
    ) -> BoxFuture<'_, Result<PriceHistory, Report<SourceError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            let path = self.dir.join(format!("{symbol}.csv"));
            let content = tokio::fs::read(&path)
                .await
                .change_context(SourceError::ReadFile)
                .attach_with(|| format!("path: {}", path.display()))?;

            let start = period.start(Utc::now().date_naive());
            let bars = parse_bars(content.as_slice(), start)
                .attach_with(|| format!("path: {}", path.display()))?;

            info!(
                symbol = %symbol,
                period = %period,
                loaded = bars.len(),
                "csv history load complete"
            );

            normalize(&symbol, bars)
        })
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Volume")]
    volume: f64,
}

/// Parse CSV rows, dropping bars dated before `start`.
pub fn parse_bars(
    reader: impl Read,
    start: Option<NaiveDate>,
) -> Result<Vec<PriceBar>, Report<SourceError>> {
    let parse_error = || SourceError::ResponseParse {
        provider: "csv".into(),
    };

    let mut bars = Vec::new();
    for (line, row) in csv::Reader::from_reader(reader)
        .deserialize::<CsvRow>()
        .enumerate()
    {
        // line 1 is the header
        let row = row
            .change_context_lazy(parse_error)
            .attach_with(|| format!("line: {}", line + 2))?;
        let date = parse_date(&row.date)
            .ok_or_else(|| Report::new(parse_error()))
            .attach_with(|| format!("line {}: bad date {:?}", line + 2, row.date))?;

        if start.is_some_and(|s| date < s) {
            continue;
        }
        bars.push(PriceBar {
            date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(bars)
}

/// Accepts `YYYY-MM-DD` with an optional trailing time part.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let day = s.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const YFINANCE_EXPORT: &str = "\
Date,Open,High,Low,Close,Volume,Dividends,Stock Splits
2024-01-02 00:00:00-05:00,170.0,171.5,169.0,171.0,9000000,0.0,0.0
2024-01-03 00:00:00-05:00,171.0,172.0,170.5,171.5,8000000,0.0,0.0
2024-01-04 00:00:00-05:00,171.5,173.5,171.0,173.0,7500000,1.05,0.0
";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_yfinance_export() {
        let bars = parse_bars(YFINANCE_EXPORT.as_bytes(), None).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, date(2024, 1, 2));
        assert_eq!(bars[2].high, 173.5);
        assert_eq!(bars[2].volume, 7_500_000.0);
    }

    #[test]
    fn parses_plain_dates() {
        let csv = "Date,Open,High,Low,Close,Volume\n2024-02-01,1,2,0.5,1.5,100\n";
        let bars = parse_bars(csv.as_bytes(), None).unwrap();
        assert_eq!(bars[0].date, date(2024, 2, 1));
    }

    #[test]
    fn filters_by_start_date() {
        let bars = parse_bars(YFINANCE_EXPORT.as_bytes(), Some(date(2024, 1, 3))).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, date(2024, 1, 3));
    }

    #[test]
    fn rejects_bad_rows() {
        let bad_number = "Date,Open,High,Low,Close,Volume\n2024-02-01,abc,2,0.5,1.5,100\n";
        assert!(parse_bars(bad_number.as_bytes(), None).is_err());

        let bad_date = "Date,Open,High,Low,Close,Volume\n02/01/2024,1,2,0.5,1.5,100\n";
        assert!(parse_bars(bad_date.as_bytes(), None).is_err());
    }

    #[test]
    fn missing_column_is_error() {
        let csv = "Date,Open,High,Low,Close\n2024-02-01,1,2,0.5,1.5\n";
        assert!(parse_bars(csv.as_bytes(), None).is_err());
    }

    #[tokio::test]
    async fn missing_file_is_read_error() {
        let source = CsvSource::new(PathBuf::from("/nonexistent/ta-charts"));
        let result = source.fetch_history("JPM", Period::Max).await;
        assert!(result.is_err());
    }
}
