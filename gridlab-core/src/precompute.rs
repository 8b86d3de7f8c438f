//! Indicator precomputation for one instrument.
//!
//! All indicators are computed once, before candidate extraction, and stored
//! in an `IndicatorValues` container keyed by indicator name.

use crate::domain::Bar;
use crate::indicators::{Indicator, IndicatorValues};

/// Compute every indicator over `bars`.
pub fn precompute_indicators(bars: &[Bar], indicators: &[Box<dyn Indicator>]) -> IndicatorValues {
    let mut iv = IndicatorValues::new();
    for indicator in indicators {
        let series = indicator.compute(bars);
        debug_assert_eq!(
            series.len(),
            bars.len(),
            "indicator '{}' produced {} values for {} bars",
            indicator.name(),
            series.len(),
            bars.len(),
        );
        iv.insert(indicator.name(), series);
    }
    iv
}

/// The warm-up length: the maximum lookback across all indicators.
pub fn compute_warmup(indicators: &[Box<dyn Indicator>]) -> usize {
    indicators.iter().map(|i| i.lookback()).max().unwrap_or(0)
}
