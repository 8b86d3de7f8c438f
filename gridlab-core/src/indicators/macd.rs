//! MACD (Moving Average Convergence/Divergence).
//!
//! Line = EMA(fast) - EMA(slow)
//! Signal = EMA(signal) of Line
//! Histogram = 2 * (Line - Signal)
//!
//! Lookback: max(fast, slow) - 1 for the line, plus signal - 1 for the
//! signal and histogram.

use super::ema::ema_of_series;
use super::sma::closes;
use super::Indicator;
use crate::domain::Bar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacdLine {
    Line,
    Signal,
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    line: MacdLine,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize, line: MacdLine) -> Self {
        assert!(
            fast >= 1 && slow >= 1 && signal >= 1,
            "MACD periods must be >= 1"
        );
        let tag = match line {
            MacdLine::Line => "line",
            MacdLine::Signal => "signal",
            MacdLine::Histogram => "hist",
        };
        Self {
            fast,
            slow,
            signal,
            line,
            name: format!("macd_{tag}_{fast}_{slow}_{signal}"),
        }
    }

    pub fn histogram(fast: usize, slow: usize, signal: usize) -> Self {
        Self::new(fast, slow, signal, MacdLine::Histogram)
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        let line = self.fast.max(self.slow) - 1;
        match self.line {
            MacdLine::Line => line,
            MacdLine::Signal | MacdLine::Histogram => line + self.signal - 1,
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes = closes(bars);
        let fast = ema_of_series(&closes, self.fast);
        let slow = ema_of_series(&closes, self.slow);
        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        if self.line == MacdLine::Line {
            return line;
        }
        let signal = ema_of_series(&line, self.signal);
        match self.line {
            MacdLine::Signal => signal,
            _ => line
                .iter()
                .zip(&signal)
                .map(|(l, s)| 2.0 * (l - s))
                .collect(),
        }
    }
}
