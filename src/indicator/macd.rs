use error_stack::{Report, bail};
use serde::Deserialize;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, ema_series};
use crate::model::PriceHistory;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MacdParams {
    /// Fast EMA span. Default 12.
    pub short_window: usize,
    /// Slow EMA span. Default 26.
    pub long_window: usize,
    /// Span of the EMA over the MACD line. Default 9.
    pub signal_window: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            short_window: 12,
            long_window: 26,
            signal_window: 9,
        }
    }
}

/// MACD line, signal line and histogram columns.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdLines {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub struct Macd {
    short_window: usize,
    long_window: usize,
    signal_window: usize,
}

impl Macd {
    pub fn new(params: MacdParams) -> Result<Self, Report<IndicatorError>> {
        if params.short_window == 0 || params.long_window == 0 || params.signal_window == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "all windows must be > 0".into(),
            });
        }
        if params.short_window >= params.long_window {
            bail!(IndicatorError::InvalidParameter {
                name: "short_window must be < long_window".into(),
            });
        }
        Ok(Self {
            short_window: params.short_window,
            long_window: params.long_window,
            signal_window: params.signal_window,
        })
    }

    pub fn calculate_lines(&self, prices: &[f64]) -> MacdLines {
        let fast = ema_series(prices, self.short_window);
        let slow = ema_series(prices, self.long_window);

        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_series(&macd, self.signal_window);
        let histogram = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();

        MacdLines {
            macd,
            signal,
            histogram,
        }
    }
}

impl Indicator for Macd {
    fn name(&self) -> &'static str {
        "macd"
    }

    fn label(&self) -> String {
        format!(
            "MACD({}, {}, {})",
            self.short_window, self.long_window, self.signal_window
        )
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["macd", "signal", "histogram"]
    }

    fn required_bars(&self) -> usize {
        1
    }

    fn compute(&self, history: &PriceHistory) -> Vec<Vec<f64>> {
        let lines = self.calculate_lines(&history.closes());
        vec![lines.macd, lines.signal, lines.histogram]
    }
}
