use crate::indicator::Indicator;
use crate::model::PriceHistory;

/// On-Balance Volume: running total of volume signed by the close-to-close
/// direction, starting from zero.
pub struct Obv;

impl Obv {
    pub fn calculate_series(&self, closes: &[f64], volumes: &[f64]) -> Vec<f64> {
        if closes.is_empty() {
            return Vec::new();
        }
        let mut total = 0.0;
        let mut out = Vec::with_capacity(closes.len());
        out.push(total);
        for (w, &volume) in closes.windows(2).zip(&volumes[1..]) {
            if w[1] > w[0] {
                total += volume;
            } else if w[1] < w[0] {
                total -= volume;
            }
            out.push(total);
        }
        out
    }
}

impl Indicator for Obv {
    fn name(&self) -> &'static str {
        "obv"
    }

    fn label(&self) -> String {
        "OBV".into()
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["obv"]
    }

    fn required_bars(&self) -> usize {
        1
    }

    fn compute(&self, history: &PriceHistory) -> Vec<Vec<f64>> {
        vec![self.calculate_series(&history.closes(), &history.volumes())]
    }
}
