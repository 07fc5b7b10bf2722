use error_stack::{Report, bail};
use serde::Deserialize;

use crate::error::IndicatorError;
use crate::indicator::ma::{Sma, SmaParams};
use crate::indicator::{Indicator, rolling_sample_std};
use crate::model::PriceHistory;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BollingerParams {
    /// Bars in the moving average and deviation. Default 20.
    pub window: usize,
    /// Band distance in standard deviations. Default 2.
    pub num_std: f64,
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self {
            window: 20,
            num_std: 2.0,
        }
    }
}

pub struct BollingerBands {
    sma: Sma,
    window: usize,
    num_std: f64,
}

impl BollingerBands {
    pub fn new(params: BollingerParams) -> Result<Self, Report<IndicatorError>> {
        // Sample deviation needs at least two observations.
        if params.window < 2 {
            bail!(IndicatorError::InvalidParameter {
                name: "window must be > 1".into(),
            });
        }
        if !(params.num_std > 0.0 && params.num_std.is_finite()) {
            bail!(IndicatorError::InvalidParameter {
                name: "num_std must be > 0".into(),
            });
        }
        Ok(Self {
            sma: Sma::new(SmaParams {
                window: params.window,
            })?,
            window: params.window,
            num_std: params.num_std,
        })
    }

    /// Returns `(upper, lower)` band columns.
    pub fn calculate_bands(&self, prices: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let middle = self.sma.calculate_prices(prices);
        let std_dev = rolling_sample_std(prices, self.window);

        middle
            .iter()
            .zip(&std_dev)
            .map(|(&m, &sd)| (m + self.num_std * sd, m - self.num_std * sd))
            .unzip()
    }
}

impl Indicator for BollingerBands {
    fn name(&self) -> &'static str {
        "bollinger_bands"
    }

    fn label(&self) -> String {
        format!("BB({}, {})", self.window, self.num_std)
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["upper", "lower"]
    }

    fn required_bars(&self) -> usize {
        self.window
    }

    fn compute(&self, history: &PriceHistory) -> Vec<Vec<f64>> {
        let (upper, lower) = self.calculate_bands(&history.closes());
        vec![upper, lower]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{assert_close, history_from_closes};

    fn bands(window: usize, num_std: f64) -> BollingerBands {
        BollingerBands::new(BollingerParams { window, num_std }).unwrap()
    }

    #[test]
    fn bollinger_window_too_small_invalid() {
        assert!(BollingerBands::new(BollingerParams { window: 1, num_std: 2.0 }).is_err());
    }

    #[test]
    fn bollinger_negative_multiplier_invalid() {
        assert!(BollingerBands::new(BollingerParams { window: 20, num_std: -1.0 }).is_err());
        assert!(
            BollingerBands::new(BollingerParams {
                window: 20,
                num_std: f64::NAN
            })
            .is_err()
        );
    }

    #[test]
    fn bollinger_label_formats_multiplier() {
        assert_eq!(bands(20, 2.0).label(), "BB(20, 2)");
        assert_eq!(bands(20, 2.5).label(), "BB(20, 2.5)");
    }

    #[test]
    fn bollinger_flat_prices_zero_width() {
        let (upper, lower) = bands(3, 2.0).calculate_bands(&[10.0; 5]);
        for i in 2..5 {
            assert_close!(upper[i], 10.0);
            assert_close!(lower[i], 10.0);
        }
    }

    #[test]
    fn bollinger_known_value() {
        // window [1, 2, 3]: mean 2, sample std 1
        let (upper, lower) = bands(3, 2.0).calculate_bands(&[1.0, 2.0, 3.0]);
        assert!(upper[1].is_nan());
        assert_close!(upper[2], 4.0);
        assert_close!(lower[2], 0.0);
    }

    #[test]
    fn bollinger_bands_symmetry() {
        let history = history_from_closes(&[1.0, 2.0, 3.0, 5.0, 8.0, 13.0]);
        let out = bands(3, 2.0).compute(&history);
        let middle = Sma::new(SmaParams { window: 3 })
            .unwrap()
            .calculate_prices(&history.closes());
        for i in 2..history.len() {
            assert_close!(out[0][i] - middle[i], middle[i] - out[1][i]);
        }
    }
}
