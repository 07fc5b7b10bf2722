use error_stack::Report;
use serde::Deserialize;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, check_window, ema_series, rolling_mean};
use crate::model::PriceHistory;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SmaParams {
    /// Trailing bars averaged. Default 50.
    pub window: usize,
}

impl Default for SmaParams {
    fn default() -> Self {
        Self { window: 50 }
    }
}

/// Simple Moving Average of close.
pub struct Sma {
    window: usize,
}

impl Sma {
    pub fn new(params: SmaParams) -> Result<Self, Report<IndicatorError>> {
        check_window(params.window)?;
        Ok(Self {
            window: params.window,
        })
    }

    /// SMA over an arbitrary price column, aligned with its input.
    pub fn calculate_prices(&self, prices: &[f64]) -> Vec<f64> {
        rolling_mean(prices, self.window)
    }
}

impl Indicator for Sma {
    fn name(&self) -> &'static str {
        "sma"
    }

    fn label(&self) -> String {
        format!("SMA({})", self.window)
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["sma"]
    }

    fn required_bars(&self) -> usize {
        self.window
    }

    fn compute(&self, history: &PriceHistory) -> Vec<Vec<f64>> {
        vec![self.calculate_prices(&history.closes())]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct EmaParams {
    /// Span of the smoothing factor `2 / (window + 1)`. Default 50.
    pub window: usize,
}

impl Default for EmaParams {
    fn default() -> Self {
        Self { window: 50 }
    }
}

/// Exponential Moving Average of close, seeded by the first close.
pub struct Ema {
    window: usize,
}

impl Ema {
    pub fn new(params: EmaParams) -> Result<Self, Report<IndicatorError>> {
        check_window(params.window)?;
        Ok(Self {
            window: params.window,
        })
    }

    /// EMA over an arbitrary price column, aligned with its input.
    pub fn calculate_prices(&self, prices: &[f64]) -> Vec<f64> {
        ema_series(prices, self.window)
    }
}

impl Indicator for Ema {
    fn name(&self) -> &'static str {
        "ema"
    }

    fn label(&self) -> String {
        format!("EMA({})", self.window)
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["ema"]
    }

    fn required_bars(&self) -> usize {
        1
    }

    fn compute(&self, history: &PriceHistory) -> Vec<Vec<f64>> {
        vec![self.calculate_prices(&history.closes())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{assert_close, history_from_closes, wavy_history};

    #[test]
    fn sma_window_zero_invalid() {
        assert!(Sma::new(SmaParams { window: 0 }).is_err());
    }

    #[test]
    fn sma_default_window() {
        assert_eq!(SmaParams::default().window, 50);
        assert_eq!(Sma::new(SmaParams::default()).unwrap().label(), "SMA(50)");
    }

    #[test]
    fn sma_flat_prices() {
        let sma = Sma::new(SmaParams { window: 3 }).unwrap();
        let values = &sma.compute(&history_from_closes(&[10.0; 7]))[0];
        assert_eq!(values.len(), 7);
        for v in &values[2..] {
            assert_close!(*v, 10.0);
        }
    }

    #[test]
    fn sma_known_value() {
        let sma = Sma::new(SmaParams { window: 3 }).unwrap();
        let values = &sma.compute(&history_from_closes(&[1.0, 2.0, 3.0, 4.0]))[0];
        assert!(values[0].is_nan());
        assert!(values[1].is_nan());
        // (1+2+3)/3 = 2.0, (2+3+4)/3 = 3.0
        assert_close!(values[2], 2.0);
        assert_close!(values[3], 3.0);
    }

    #[test]
    fn ema_window_zero_invalid() {
        assert!(Ema::new(EmaParams { window: 0 }).is_err());
    }

    #[test]
    fn ema_has_no_warm_up_gap() {
        let ema = Ema::new(EmaParams { window: 5 }).unwrap();
        let values = &ema.compute(&history_from_closes(&[4.0, 8.0]))[0];
        assert_eq!(values[0], 4.0);
        // k = 2/6
        assert_close!(values[1], 8.0 / 3.0 + 4.0 * 2.0 / 3.0);
    }

    #[test]
    fn ema_window_one_equals_close() {
        let history = wavy_history(30);
        let ema = Ema::new(EmaParams { window: 1 }).unwrap();
        assert_eq!(ema.compute(&history)[0], history.closes());
    }

    #[test]
    fn ema_flat_prices() {
        let ema = Ema::new(EmaParams { window: 3 }).unwrap();
        for v in &ema.compute(&history_from_closes(&[10.0; 6]))[0] {
            assert_close!(*v, 10.0);
        }
    }
}
