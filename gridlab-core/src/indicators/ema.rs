//! Exponential smoothing.
//!
//! Two flavours are used by the library:
//! - [`ema_of_series`]: span-based EMA, alpha = 2/(period+1), seeded with the
//!   SMA of the first `period` defined values. Used by MACD.
//! - [`smooth_series`]: fixed-decay smoothing seeded with the first defined
//!   value. Used by the stochastic K/D lines.
//!
//! Both skip leading NaNs (the warm-up of an upstream series) and propagate a
//! NaN that appears after seeding to every later position.

use super::sma::closes;
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        ema_of_series(&closes(bars), self.period)
    }
}

fn first_defined(values: &[f64]) -> Option<usize> {
    values.iter().position(|v| !v.is_nan())
}

/// Span-based EMA over an arbitrary series.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }
    let Some(start) = first_defined(values) else {
        return result;
    };
    let seed_end = start + period;
    if seed_end > n {
        return result;
    }

    let seed_window = &values[start..seed_end];
    if seed_window.iter().any(|v| v.is_nan()) {
        return result;
    }
    let seed = seed_window.iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = seed;
    for i in seed_end..n {
        if values[i].is_nan() {
            return result;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

/// Fixed-decay exponential smoothing: `s[t] = alpha * x[t] + (1 - alpha) * s[t-1]`.
pub fn smooth_series(values: &[f64], alpha: f64) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    let Some(start) = first_defined(values) else {
        return result;
    };
    let mut prev = values[start];
    result[start] = prev;
    for i in (start + 1)..n {
        if values[i].is_nan() {
            return result;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}
