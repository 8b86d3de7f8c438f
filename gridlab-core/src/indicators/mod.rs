//! Indicator library.
//!
//! Indicators are pure functions: bar history in, numeric series out, one
//! value per bar. Positions before the governing window fills are `f64::NAN`
//! and must never be read as zero.
//!
//! Multi-line indicators (stochastic, MACD, Bollinger) are exposed as separate
//! instances per line, keeping the single-series `Indicator` trait unchanged.

pub mod bollinger;
pub mod deviation;
pub mod ema;
pub mod macd;
pub mod rolling;
pub mod rsi;
pub mod sma;
pub mod stochastic;
pub mod volume_ratio;

pub use bollinger::{Bollinger, BollingerBand};
pub use deviation::MaDeviation;
pub use ema::Ema;
pub use macd::{Macd, MacdLine};
pub use rsi::Rsi;
pub use sma::Sma;
pub use stochastic::{Stochastic, StochasticLine};
pub use volume_ratio::VolumeRatio;

use crate::domain::Bar;
use std::collections::HashMap;

/// Trait for indicators.
///
/// `compute` returns a series of the same length as `bars`; the first
/// `lookback()` values are `f64::NAN`.
///
/// # Look-ahead contamination guard
/// No value at bar t may depend on bar t+1 or later. Every indicator must pass
/// the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Series name used by admission conditions and exit rules (e.g. "rsi", "k").
    fn name(&self) -> &str;

    /// Number of leading bars with no defined value.
    fn lookback(&self) -> usize;

    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Precomputed indicator series for one instrument, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a named indicator series.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    /// Get the indicator value at a specific bar index.
    pub fn get(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.series
            .get(name)
            .and_then(|v| v.get(bar_index).copied())
    }

    /// Get the full series for a named indicator.
    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Renames an indicator so configuration can refer to it by a short alias.
pub struct Named {
    name: String,
    inner: Box<dyn Indicator>,
}

impl Named {
    pub fn new(name: impl Into<String>, inner: Box<dyn Indicator>) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

impl Indicator for Named {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.inner.lookback()
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        self.inner.compute(bars)
    }
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for first bar), high = max(open,close) + 1.0,
/// low = min(open,close) - 1.0, volume = 1000, turnover = 1.0.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
                turnover: 1.0,
                pct_change: if i == 0 {
                    0.0
                } else {
                    (close - open) / open * 100.0
                },
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
