//! Stochastic oscillator (KDJ).
//!
//! RSV = (close - lowest_low(n)) / (highest_high(n) - lowest_low(n)) * 100,
//! with the range floored at `STOCH_EPSILON`.
//! K = smoothing of RSV with decay 1/smoothing, seeded at the first RSV.
//! D = the same smoothing applied to K.
//! J = 3K - 2D.
//! Lookback: period - 1 for all three lines.

use super::ema::smooth_series;
use super::rolling::{rolling_max, rolling_min};
use super::Indicator;
use crate::domain::Bar;
use serde::{Deserialize, Serialize};

/// Floor for the high-low range of the RSV window.
pub const STOCH_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StochasticLine {
    K,
    D,
    J,
}

#[derive(Debug, Clone)]
pub struct Stochastic {
    period: usize,
    smoothing: usize,
    line: StochasticLine,
    name: String,
}

impl Stochastic {
    pub fn new(period: usize, smoothing: usize, line: StochasticLine) -> Self {
        assert!(period >= 1, "stochastic period must be >= 1");
        assert!(smoothing >= 1, "stochastic smoothing must be >= 1");
        let tag = match line {
            StochasticLine::K => "k",
            StochasticLine::D => "d",
            StochasticLine::J => "j",
        };
        Self {
            period,
            smoothing,
            line,
            name: format!("stoch_{tag}_{period}_{smoothing}"),
        }
    }

    pub fn k(period: usize, smoothing: usize) -> Self {
        Self::new(period, smoothing, StochasticLine::K)
    }

    pub fn d(period: usize, smoothing: usize) -> Self {
        Self::new(period, smoothing, StochasticLine::D)
    }

    pub fn j(period: usize, smoothing: usize) -> Self {
        Self::new(period, smoothing, StochasticLine::J)
    }
}

/// Raw stochastic value per bar.
pub fn rsv(bars: &[Bar], period: usize) -> Vec<f64> {
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lowest = rolling_min(&lows, period);
    let highest = rolling_max(&highs, period);
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let range = (highest[i] - lowest[i]).max(STOCH_EPSILON);
            (bar.close - lowest[i]) / range * 100.0
        })
        .collect()
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let alpha = 1.0 / self.smoothing as f64;
        let k = smooth_series(&rsv(bars, self.period), alpha);
        match self.line {
            StochasticLine::K => k,
            StochasticLine::D => smooth_series(&k, alpha),
            StochasticLine::J => {
                let d = smooth_series(&k, alpha);
                k.iter().zip(&d).map(|(k, d)| 3.0 * k - 2.0 * d).collect()
            }
        }
    }
}
