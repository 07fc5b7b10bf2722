use error_stack::Report;
use serde::Deserialize;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, check_window, rolling_max, rolling_min};
use crate::model::PriceHistory;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct StochasticParams {
    /// Bars in the high/low range. Default 14.
    pub window: usize,
}

impl Default for StochasticParams {
    fn default() -> Self {
        Self { window: 14 }
    }
}

/// Stochastic oscillator %K.
pub struct StochasticOscillator {
    window: usize,
}

impl StochasticOscillator {
    pub fn new(params: StochasticParams) -> Result<Self, Report<IndicatorError>> {
        check_window(params.window)?;
        Ok(Self {
            window: params.window,
        })
    }
}

impl Indicator for StochasticOscillator {
    fn name(&self) -> &'static str {
        "stochastic"
    }

    fn label(&self) -> String {
        format!("STOCH({})", self.window)
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["k"]
    }

    fn required_bars(&self) -> usize {
        self.window
    }

    fn compute(&self, history: &PriceHistory) -> Vec<Vec<f64>> {
        let lowest = rolling_min(&history.lows(), self.window);
        let highest = rolling_max(&history.highs(), self.window);

        let k = history
            .closes()
            .iter()
            .zip(lowest.iter().zip(&highest))
            .map(|(&close, (&low, &high))| {
                if low.is_nan() || high.is_nan() {
                    f64::NAN
                } else if high == low {
                    // No range in the window.
                    0.0
                } else {
                    100.0 * (close - low) / (high - low)
                }
            })
            .collect();
        vec![k]
    }
}
