//! Causal rolling-window helpers over raw `f64` series.
//!
//! Every helper returns a series of the input's length with NaN for the first
//! `window - 1` positions and for any window that contains a NaN.

fn rolling<F>(values: &[f64], window: usize, reduce: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window == 0 || n < window {
        return result;
    }
    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = reduce(slice);
    }
    result
}

pub fn rolling_min(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

pub fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| {
        w.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    })
}

pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Population standard deviation (divide by N).
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| {
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        let var = w.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / w.len() as f64;
        var.sqrt()
    })
}
