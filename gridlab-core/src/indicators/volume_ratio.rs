//! Volume ratio: today's volume over the mean volume of the previous `period` bars.
//!
//! Lookback: period. A zero average yields NaN rather than infinity.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct VolumeRatio {
    period: usize,
    name: String,
}

impl VolumeRatio {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "volume ratio period must be >= 1");
        Self {
            period,
            name: format!("vol_ratio_{period}"),
        }
    }
}

impl Indicator for VolumeRatio {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        for i in self.period..n {
            let prior = &bars[i - self.period..i];
            if prior.iter().any(|b| b.volume.is_nan()) {
                continue;
            }
            let avg = prior.iter().map(|b| b.volume).sum::<f64>() / self.period as f64;
            if avg > 0.0 {
                result[i] = bars[i].volume / avg;
            }
        }
        result
    }
}
