use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::SourceError;
use crate::model::{PriceBar, PriceHistory};
use crate::source::{Period, PriceSource, normalize};

const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
// The chart endpoint rejects requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) ta-charts/0.1";

/// Daily bars from the Yahoo Finance chart API.
pub struct YahooSource {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl YahooSource {
    pub fn new(requests_per_second: NonZeroU32) -> Self {
        Self::with_base_url(YAHOO_BASE_URL, requests_per_second)
    }

    pub fn with_base_url(base_url: &str, requests_per_second: NonZeroU32) -> Self {
        let quota = Quota::per_second(requests_per_second);
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

impl PriceSource for YahooSource {
    fn provider(&self) -> &'static str {
        "yahoo"
    }

    fn fetch_history(
        &self,
        symbol: &str,
        period: Period,
    ) -> BoxFuture<'_, Result<PriceHistory, Report<SourceError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            self.rate_limiter.until_ready().await;

            let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
            let now = Utc::now();
            let mut params = vec![("interval", "1d".to_owned())];
            match period.start(now.date_naive()) {
                Some(start) => {
                    let start = start.and_time(NaiveTime::MIN).and_utc().timestamp();
                    params.push(("period1", start.to_string()));
                    params.push(("period2", now.timestamp().to_string()));
                }
                None => params.push(("range", "max".to_owned())),
            }

            debug!(symbol = %symbol, period = %period, "requesting yahoo chart");

            let response = self
                .client
                .get(&url)
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .query(&params)
                .send()
                .await
                .change_context(SourceError::Request {
                    provider: "yahoo".into(),
                })?;

            if !response.status().is_success() {
                return Err(Report::new(SourceError::Request {
                    provider: "yahoo".into(),
                })
                .attach(format!("HTTP status: {}", response.status()))
                .attach(format!("symbol: {symbol}")));
            }

            let body: ChartResponse =
                response
                    .json()
                    .await
                    .change_context(SourceError::ResponseParse {
                        provider: "yahoo".into(),
                    })?;

            let bars = body.into_bars(&symbol)?;

            info!(
                symbol = %symbol,
                period = %period,
                fetched = bars.len(),
                "yahoo history fetch complete"
            );

            normalize(&symbol, bars)
        })
    }
}

// ── Response types ───────────────────────────────────────────────────────────

/// `{ "chart": { "result": [ ... ], "error": null } }`
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ChartErrorBody {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    /// Bar open times, seconds since epoch. Absent when the range is empty.
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds; used to recover the trading date.
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<Quote>,
}

/// Column-oriented OHLCV; halted sessions show up as `null`.
#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

impl ChartResponse {
    fn into_bars(self, symbol: &str) -> Result<Vec<PriceBar>, Report<SourceError>> {
        if let Some(error) = self.chart.error {
            return Err(Report::new(SourceError::Empty {
                symbol: symbol.to_owned(),
            })
            .attach(format!("{}: {}", error.code, error.description)));
        }

        let Some(result) = self.chart.result.and_then(|r| r.into_iter().next()) else {
            return Err(Report::new(SourceError::Empty {
                symbol: symbol.to_owned(),
            }));
        };

        let offset = result.meta.gmtoffset;
        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .unwrap_or_default();

        let column = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

        let bars = result
            .timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, &ts)| {
                let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
                Some(PriceBar {
                    date,
                    open: column(&quote.open, i)?,
                    high: column(&quote.high, i)?,
                    low: column(&quote.low, i)?,
                    close: column(&quote.close, i)?,
                    volume: column(&quote.volume, i)?,
                })
            })
            .collect();

        Ok(bars)
    }
}
