use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily OHLCV observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Daily bars for one ticker, oldest first.
///
/// Dates are expected to be strictly increasing. Sources guarantee this; the
/// indicator engine relies on it without checking.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistory {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
}

impl PriceHistory {
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    pub fn opens(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.open).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }
}

/// A single named output line of an indicator.
///
/// `values` has one entry per input bar; positions without enough history
/// hold `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub values: Vec<f64>,
}

impl Series {
    /// Values with undefined positions mapped to `None`.
    pub fn defined(&self) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|v| v.is_finite().then_some(*v))
            .collect()
    }
}

/// The date axis plus every output line an indicator produced.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorOutput {
    pub name: String,
    pub dates: Vec<NaiveDate>,
    pub series: Vec<Series>,
}

impl IndicatorOutput {
    /// Trace name for output `index`, e.g. `"BB(20, 2) upper"`.
    ///
    /// Single-output indicators are named by their label alone.
    pub fn trace_name(&self, index: usize) -> String {
        if self.series.len() == 1 {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.series[index].label)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::history_from_closes;

    #[test]
    fn columns_follow_bar_order() {
        let history = history_from_closes(&[1.0, 2.0, 3.0]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.closes(), vec![1.0, 2.0, 3.0]);
        let dates = history.dates();
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn empty_history() {
        let history = PriceHistory::new("TEST", vec![]);
        assert!(history.is_empty());
        assert!(history.closes().is_empty());
    }

    #[test]
    fn series_defined_maps_nan_to_none() {
        let series = Series {
            label: "sma".into(),
            values: vec![f64::NAN, 2.0],
        };
        assert_eq!(series.defined(), vec![None, Some(2.0)]);
    }

    #[test]
    fn trace_name_for_single_and_multi_output() {
        let single = IndicatorOutput {
            name: "SMA(50)".into(),
            dates: vec![],
            series: vec![Series {
                label: "sma".into(),
                values: vec![],
            }],
        };
        assert_eq!(single.trace_name(0), "SMA(50)");

        let multi = IndicatorOutput {
            name: "BB(20, 2)".into(),
            dates: vec![],
            series: vec![
                Series {
                    label: "upper".into(),
                    values: vec![],
                },
                Series {
                    label: "lower".into(),
                    values: vec![],
                },
            ],
        };
        assert_eq!(multi.trace_name(1), "BB(20, 2) lower");
    }
}
