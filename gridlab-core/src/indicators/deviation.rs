//! Moving-average deviation ("potential").
//!
//! (SMA(close, period) - close) / close * 100, i.e. how far, in percent, price sits
//! below its moving average. Positive values mean room to revert upward.
//! A zero close is replaced by 1.0 in the denominator.
//! Lookback: period - 1.

use super::rolling::rolling_mean;
use super::sma::closes;
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct MaDeviation {
    period: usize,
    name: String,
}

impl MaDeviation {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "deviation period must be >= 1");
        Self {
            period,
            name: format!("ma_dev_{period}"),
        }
    }
}

impl Indicator for MaDeviation {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes = closes(bars);
        rolling_mean(&closes, self.period)
            .iter()
            .zip(&closes)
            .map(|(ma, &close)| {
                let denom = if close == 0.0 { 1.0 } else { close };
                (ma - close) / denom * 100.0
            })
            .collect()
    }
}
