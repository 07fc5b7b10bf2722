use error_stack::Report;
use serde::Deserialize;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, check_window, rolling_mean};
use crate::model::PriceHistory;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RsiParams {
    /// Bars in the gain/loss averages. Default 14.
    pub window: usize,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self { window: 14 }
    }
}

/// RSI (Relative Strength Index) over simple trailing averages of gains and
/// losses.
pub struct Rsi {
    window: usize,
}

impl Rsi {
    pub fn new(params: RsiParams) -> Result<Self, Report<IndicatorError>> {
        check_window(params.window)?;
        Ok(Self {
            window: params.window,
        })
    }

    pub fn calculate_prices(&self, prices: &[f64]) -> Vec<f64> {
        // The first bar has no predecessor and counts as neither gain nor loss.
        let mut gains = vec![0.0; prices.len()];
        let mut losses = vec![0.0; prices.len()];
        for i in 1..prices.len() {
            let delta = prices[i] - prices[i - 1];
            gains[i] = delta.max(0.0);
            losses[i] = (-delta).max(0.0);
        }

        let avg_gain = rolling_mean(&gains, self.window);
        let avg_loss = rolling_mean(&losses, self.window);

        avg_gain
            .iter()
            .zip(&avg_loss)
            .map(|(&g, &l)| {
                if g.is_nan() || l.is_nan() {
                    f64::NAN
                } else {
                    rsi_value(g, l)
                }
            })
            .collect()
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &'static str {
        "rsi"
    }

    fn label(&self) -> String {
        format!("RSI({})", self.window)
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["rsi"]
    }

    fn required_bars(&self) -> usize {
        self.window
    }

    fn compute(&self, history: &PriceHistory) -> Vec<Vec<f64>> {
        vec![self.calculate_prices(&history.closes())]
    }
}

/// No losses in the window pins RSI at 100, flat windows included.
fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
