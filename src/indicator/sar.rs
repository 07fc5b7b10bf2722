use error_stack::{Report, bail};
use serde::Deserialize;

use crate::error::IndicatorError;
use crate::indicator::Indicator;
use crate::model::{PriceBar, PriceHistory};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SarParams {
    /// Initial acceleration factor and its increment. Default 0.02.
    pub step: f64,
    /// Cap on the acceleration factor. Default 0.2.
    pub max_step: f64,
}

impl Default for SarParams {
    fn default() -> Self {
        Self {
            step: 0.02,
            max_step: 0.2,
        }
    }
}

/// Parabolic stop-and-reverse.
///
/// Unlike the windowed indicators, each value depends on the previous one, so
/// bars are walked exactly once in date order.
pub struct ParabolicSar {
    step: f64,
    max_step: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SarState {
    trend_up: bool,
    accel: f64,
    extreme: f64,
    sar: f64,
}

impl SarState {
    fn start(bar: &PriceBar, step: f64) -> Self {
        Self {
            trend_up: true,
            accel: step,
            extreme: bar.high,
            sar: bar.low,
        }
    }

    fn advance(&mut self, bar: &PriceBar, step: f64, max_step: f64) {
        let candidate = self.sar + self.accel * (self.extreme - self.sar);

        self.sar = if self.trend_up && bar.close < candidate {
            let reset = self.extreme;
            self.trend_up = false;
            self.extreme = bar.low;
            self.accel = step;
            reset
        } else if !self.trend_up && bar.close > candidate {
            let reset = self.extreme;
            self.trend_up = true;
            self.extreme = bar.high;
            self.accel = step;
            reset
        } else {
            let new_extreme = if self.trend_up {
                (bar.high > self.extreme).then_some(bar.high)
            } else {
                (bar.low < self.extreme).then_some(bar.low)
            };
            if let Some(extreme) = new_extreme {
                self.extreme = extreme;
                self.accel += step;
            }
            candidate
        };

        self.accel = self.accel.min(max_step);
    }
}

impl ParabolicSar {
    pub fn new(params: SarParams) -> Result<Self, Report<IndicatorError>> {
        if !(params.step > 0.0 && params.step.is_finite()) {
            bail!(IndicatorError::InvalidParameter {
                name: "step must be > 0".into(),
            });
        }
        if !(params.max_step >= params.step && params.max_step.is_finite()) {
            bail!(IndicatorError::InvalidParameter {
                name: "max_step must be >= step".into(),
            });
        }
        Ok(Self {
            step: params.step,
            max_step: params.max_step,
        })
    }

    fn walk(&self, history: &PriceHistory) -> Vec<SarState> {
        let Some(first) = history.bars.first() else {
            return Vec::new();
        };
        let mut state = SarState::start(first, self.step);
        let mut states = Vec::with_capacity(history.len());
        states.push(state);
        for bar in &history.bars[1..] {
            state.advance(bar, self.step, self.max_step);
            states.push(state);
        }
        states
    }
}

impl Indicator for ParabolicSar {
    fn name(&self) -> &'static str {
        "parabolic_sar"
    }

    fn label(&self) -> String {
        format!("SAR({}, {})", self.step, self.max_step)
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["sar"]
    }

    fn required_bars(&self) -> usize {
        1
    }

    fn compute(&self, history: &PriceHistory) -> Vec<Vec<f64>> {
        vec![self.walk(history).iter().map(|s| s.sar).collect()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::history_from_hlc;

    fn sar() -> ParabolicSar {
        ParabolicSar::new(SarParams::default()).unwrap()
    }

    fn rising_rows(len: usize) -> Vec<(f64, f64, f64)> {
        (0..len)
            .map(|i| {
                let close = 10.0 + i as f64;
                (close + 0.5, close - 0.5, close)
            })
            .collect()
    }

    #[test]
    fn sar_invalid_steps() {
        assert!(ParabolicSar::new(SarParams { step: 0.0, max_step: 0.2 }).is_err());
        assert!(ParabolicSar::new(SarParams { step: 0.3, max_step: 0.2 }).is_err());
    }

    #[test]
    fn sar_starts_at_first_low() {
        let history = history_from_hlc(&rising_rows(3));
        assert_eq!(sar().compute(&history)[0][0], 9.5);
    }

    #[test]
    fn sar_rising_series_never_flips() {
        let history = history_from_hlc(&rising_rows(40));
        let states = sar().walk(&history);
        for (state, bar) in states.iter().zip(&history.bars) {
            assert!(state.trend_up);
            assert!(state.sar < bar.close, "sar {} >= close {}", state.sar, bar.close);
        }
    }

    #[test]
    fn sar_accel_capped_at_max_step() {
        let history = history_from_hlc(&rising_rows(40));
        let states = sar().walk(&history);
        assert!(states.iter().all(|s| s.accel <= 0.2));
        assert_eq!(states.last().map(|s| s.accel), Some(0.2));
    }

    #[test]
    fn sar_reversal_emits_prior_extreme() {
        let mut rows = rising_rows(10);
        // highest high so far is 19.5; this bar closes well below the stop
        rows.push((12.0, 5.0, 6.0));
        let history = history_from_hlc(&rows);
        let states = sar().walk(&history);

        let flipped = states[10];
        assert_eq!(flipped.sar, 19.5);
        assert!(!flipped.trend_up);
        assert_eq!(flipped.extreme, 5.0);
        assert_eq!(flipped.accel, 0.02);
    }

    #[test]
    fn sar_downtrend_flips_back_up() {
        let mut rows = rising_rows(10);
        rows.push((12.0, 5.0, 6.0));
        rows.push((5.5, 4.0, 4.5));
        // rally far above the falling stop
        rows.push((30.0, 20.0, 29.0));
        let history = history_from_hlc(&rows);
        let states = sar().walk(&history);

        assert!(!states[11].trend_up);
        assert!(states[11].sar > history.bars[11].close);
        assert!(states[12].trend_up);
        // the downtrend extreme was the lowest low, 4.0
        assert_eq!(states[12].sar, 4.0);
    }

    #[test]
    fn sar_empty_history() {
        let history = history_from_hlc(&[]);
        assert!(sar().compute(&history)[0].is_empty());
    }
}
