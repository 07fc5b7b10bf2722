pub mod atr;
pub mod bollinger;
pub mod cci;
pub mod ma;
pub mod macd;
pub mod rsi;
pub mod sar;
pub mod stochastic;
pub mod volume;

use error_stack::Report;
use serde::Deserialize;

use crate::error::IndicatorError;
use crate::model::{IndicatorOutput, PriceHistory, Series};

use atr::{Atr, AtrParams};
use bollinger::{BollingerBands, BollingerParams};
use cci::{Cci, CciParams};
use ma::{Ema, EmaParams, Sma, SmaParams};
use macd::{Macd, MacdParams};
use rsi::{Rsi, RsiParams};
use sar::{ParabolicSar, SarParams};
use stochastic::{StochasticOscillator, StochasticParams};
use volume::Obv;

/// Identity of an indicator instance: what it is, how it is labelled and
/// which lines it emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub name: &'static str,
    pub label: String,
    pub outputs: &'static [&'static str],
}

impl Descriptor {
    pub fn arity(&self) -> usize {
        self.outputs.len()
    }
}

/// A technical analysis indicator over a daily price history.
///
/// Bars must be in ascending date order (oldest first). Every output line has
/// exactly one value per input bar; positions before the lookback is
/// satisfied are `NaN`. Computation never fails and never mutates the input.
pub trait Indicator: Send + Sync {
    /// Stable kind identifier (e.g. `"rsi"`, `"bollinger_bands"`).
    fn name(&self) -> &'static str;

    /// Display label including parameters (e.g. `"RSI(14)"`).
    fn label(&self) -> String;

    /// Names of the emitted lines, in output order.
    fn outputs(&self) -> &'static [&'static str];

    /// Number of bars needed before the first defined value.
    fn required_bars(&self) -> usize;

    /// Raw output columns, one per entry of [`Indicator::outputs`].
    fn compute(&self, history: &PriceHistory) -> Vec<Vec<f64>>;

    fn descriptor(&self) -> Descriptor {
        Descriptor {
            name: self.name(),
            label: self.label(),
            outputs: self.outputs(),
        }
    }

    /// Compute the indicator and attach the date axis and line labels.
    fn calculate(&self, history: &PriceHistory) -> IndicatorOutput {
        let columns = self.compute(history);
        debug_assert_eq!(columns.len(), self.outputs().len());
        let series = self
            .outputs()
            .iter()
            .zip(columns)
            .map(|(label, values)| Series {
                label: (*label).to_string(),
                values,
            })
            .collect();
        IndicatorOutput {
            name: self.label(),
            dates: history.dates(),
            series,
        }
    }
}

/// Indicator selection as written in the config file.
///
/// The `kind` key picks the indicator; the remaining keys are its parameters,
/// each falling back to the documented default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorConfig {
    Sma(SmaParams),
    Ema(EmaParams),
    Rsi(RsiParams),
    BollingerBands(BollingerParams),
    Macd(MacdParams),
    Atr(AtrParams),
    Stochastic(StochasticParams),
    Cci(CciParams),
    ParabolicSar(SarParams),
    Obv,
}

impl IndicatorConfig {
    /// Validate the parameters and build the indicator.
    pub fn build(&self) -> Result<Box<dyn Indicator>, Report<IndicatorError>> {
        Ok(match self {
            Self::Sma(p) => Box::new(Sma::new(*p)?),
            Self::Ema(p) => Box::new(Ema::new(*p)?),
            Self::Rsi(p) => Box::new(Rsi::new(*p)?),
            Self::BollingerBands(p) => Box::new(BollingerBands::new(*p)?),
            Self::Macd(p) => Box::new(Macd::new(*p)?),
            Self::Atr(p) => Box::new(Atr::new(*p)?),
            Self::Stochastic(p) => Box::new(StochasticOscillator::new(*p)?),
            Self::Cci(p) => Box::new(Cci::new(*p)?),
            Self::ParabolicSar(p) => Box::new(ParabolicSar::new(*p)?),
            Self::Obv => Box::new(Obv),
        })
    }
}

/// Build every configured indicator, failing on the first invalid entry.
pub fn build_all(
    configs: &[IndicatorConfig],
) -> Result<Vec<Box<dyn Indicator>>, Report<IndicatorError>> {
    configs.iter().map(IndicatorConfig::build).collect()
}

pub(crate) fn check_window(window: usize) -> Result<(), Report<IndicatorError>> {
    if window == 0 {
        error_stack::bail!(IndicatorError::InvalidParameter {
            name: "window must be > 0".into(),
        });
    }
    Ok(())
}

/// Apply `f` to every full trailing window of `values`.
///
/// Output position `i` holds `f(values[i + 1 - window..=i])`; the first
/// `window - 1` positions are `NaN`.
pub(crate) fn trailing(values: &[f64], window: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }
    for (start, w) in values.windows(window).enumerate() {
        out[start + window - 1] = f(w);
    }
    out
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    trailing(values, window, mean)
}

/// Trailing sample standard deviation (denominator `window - 1`).
pub(crate) fn rolling_sample_std(values: &[f64], window: usize) -> Vec<f64> {
    trailing(values, window, |w| {
        if w.len() < 2 {
            return f64::NAN;
        }
        let m = mean(w);
        let ss = w.iter().map(|&v| (v - m).powi(2)).sum::<f64>();
        (ss / (w.len() - 1) as f64).sqrt()
    })
}

pub(crate) fn rolling_min(values: &[f64], window: usize) -> Vec<f64> {
    trailing(values, window, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

pub(crate) fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    trailing(values, window, |w| {
        w.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    })
}

/// Exponential moving average with smoothing factor `2 / (window + 1)`,
/// seeded by the first value so there is no warm-up gap.
pub(crate) fn ema_series(values: &[f64], window: usize) -> Vec<f64> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };
    let k = 2.0 / (window as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut ema = first;
    out.push(ema);
    for &v in &values[1..] {
        ema = v * k + ema * (1.0 - k);
        out.push(ema);
    }
    out
}
