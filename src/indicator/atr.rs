use error_stack::Report;
use serde::Deserialize;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, check_window, rolling_mean};
use crate::model::PriceHistory;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AtrParams {
    /// Bars in the true-range average. Default 14.
    pub window: usize,
}

impl Default for AtrParams {
    fn default() -> Self {
        Self { window: 14 }
    }
}

/// Average True Range as a simple trailing mean of true range.
pub struct Atr {
    window: usize,
}

impl Atr {
    pub fn new(params: AtrParams) -> Result<Self, Report<IndicatorError>> {
        check_window(params.window)?;
        Ok(Self {
            window: params.window,
        })
    }
}

/// Per-bar true range. The first bar has no prior close, so its range is
/// `high - low`.
pub fn true_range(history: &PriceHistory) -> Vec<f64> {
    let bars = &history.bars;
    let mut tr = Vec::with_capacity(bars.len());
    if let Some(first) = bars.first() {
        tr.push(first.high - first.low);
    }
    for w in bars.windows(2) {
        let (prev, bar) = (&w[0], &w[1]);
        let range = (bar.high - bar.low)
            .max((bar.high - prev.close).abs())
            .max((bar.low - prev.close).abs());
        tr.push(range);
    }
    tr
}

impl Indicator for Atr {
    fn name(&self) -> &'static str {
        "atr"
    }

    fn label(&self) -> String {
        format!("ATR({})", self.window)
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["atr"]
    }

    fn required_bars(&self) -> usize {
        self.window
    }

    fn compute(&self, history: &PriceHistory) -> Vec<Vec<f64>> {
        vec![rolling_mean(&true_range(history), self.window)]
    }
}
