use error_stack::Report;
use serde::Deserialize;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, check_window, mean};
use crate::model::PriceHistory;

/// Lambert's constant: scales CCI so most values fall within ±100.
const CCI_SCALE: f64 = 0.015;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CciParams {
    /// Bars in the moving average and mean deviation. Default 20.
    pub window: usize,
}

impl Default for CciParams {
    fn default() -> Self {
        Self { window: 20 }
    }
}

/// Commodity Channel Index over close.
pub struct Cci {
    window: usize,
}

impl Cci {
    pub fn new(params: CciParams) -> Result<Self, Report<IndicatorError>> {
        check_window(params.window)?;
        Ok(Self {
            window: params.window,
        })
    }

    pub fn calculate_prices(&self, prices: &[f64]) -> Vec<f64> {
        let mut out = vec![f64::NAN; prices.len()];
        for (start, w) in prices.windows(self.window).enumerate() {
            let sma = mean(w);
            let mad = w.iter().map(|&p| (p - sma).abs()).sum::<f64>() / w.len() as f64;
            let close = w[w.len() - 1];
            // `mean` can miss a constant window by an ulp, leaving a residue
            // in both numerator and deviation.
            let flat = w.iter().all(|&p| p == w[0]) || mad <= f64::EPSILON * sma.abs();
            out[start + self.window - 1] = if flat {
                0.0
            } else {
                (close - sma) / (CCI_SCALE * mad)
            };
        }
        out
    }
}

impl Indicator for Cci {
    fn name(&self) -> &'static str {
        "cci"
    }

    fn label(&self) -> String {
        format!("CCI({})", self.window)
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["cci"]
    }

    fn required_bars(&self) -> usize {
        self.window
    }

    fn compute(&self, history: &PriceHistory) -> Vec<Vec<f64>> {
        vec![self.calculate_prices(&history.closes())]
    }
}
