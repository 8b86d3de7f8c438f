//! Candidate Pool Builder.
//!
//! Turns one instrument's bar history into admitted entry points, each
//! carrying an entry snapshot and a fixed-length forward window. Pools from
//! many instruments are concatenated into a single [`CandidatePool`] that the
//! grid evaluator reads without further reference to bars or instruments.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::admission::AdmissionPredicate;
use crate::domain::{Bar, Candidate, ForwardWindow};
use crate::indicators::{Indicator, IndicatorValues};
use crate::precompute::{compute_warmup, precompute_indicators};

/// Window-field slots that are always present, in this order.
pub const WINDOW_CLOSE: usize = 0;
pub const WINDOW_LOW: usize = 1;
pub const WINDOW_HIGH: usize = 2;

const BASE_WINDOW_FIELDS: [&str; 3] = ["close", "low", "high"];

#[derive(Debug, Error, PartialEq)]
pub enum PoolError {
    #[error("{bars} bars is not enough history: need at least {required} (warm-up {warmup} + horizon {horizon} + 1)")]
    InsufficientHistory {
        bars: usize,
        required: usize,
        warmup: usize,
        horizon: usize,
    },

    #[error("pool layout references unknown series '{0}'")]
    MissingIndicator(String),

    #[error("forward horizon must be at least one bar")]
    ZeroHorizon,
}

/// Names of the values captured per candidate.
///
/// Snapshot fields are read at the entry bar. Window fields are read on each
/// of the `horizon` bars after entry; close, low and high always occupy the
/// first three slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolLayout {
    pub horizon: usize,
    pub snapshot_fields: Vec<String>,
    pub window_fields: Vec<String>,
}

impl PoolLayout {
    pub fn new(horizon: usize) -> Self {
        Self {
            horizon,
            snapshot_fields: Vec::new(),
            window_fields: BASE_WINDOW_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Add a snapshot field. Duplicates are ignored.
    pub fn with_snapshot(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.snapshot_fields.contains(&name) {
            self.snapshot_fields.push(name);
        }
        self
    }

    /// Add a window field. Duplicates are ignored.
    pub fn with_window(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.window_fields.contains(&name) {
            self.window_fields.push(name);
        }
        self
    }

    pub fn snapshot_index(&self, name: &str) -> Option<usize> {
        self.snapshot_fields.iter().position(|f| f == name)
    }

    pub fn window_index(&self, name: &str) -> Option<usize> {
        self.window_fields.iter().position(|f| f == name)
    }
}

/// All candidates of a run, conforming to one layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePool {
    layout: PoolLayout,
    candidates: Vec<Candidate>,
}

impl CandidatePool {
    pub fn new(layout: PoolLayout) -> Self {
        Self {
            layout,
            candidates: Vec::new(),
        }
    }

    /// Append one instrument's candidates.
    ///
    /// Candidates must have been built with this pool's layout.
    pub fn extend(&mut self, candidates: Vec<Candidate>) {
        debug_assert!(candidates.iter().all(|c| {
            c.snapshot.len() == self.layout.snapshot_fields.len()
                && c.window.horizon() == self.layout.horizon
                && c.window.field_count() == self.layout.window_fields.len()
        }));
        self.candidates.extend(candidates);
    }

    pub fn layout(&self) -> &PoolLayout {
        &self.layout
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Resolve a layout field to a full-length column.
fn column<'a>(
    bars: &[Bar],
    indicators: &'a IndicatorValues,
    name: &str,
) -> Result<Cow<'a, [f64]>, PoolError> {
    if Bar::FIELDS.contains(&name) {
        let values = bars
            .iter()
            .map(|b| b.field(name).unwrap_or(f64::NAN))
            .collect();
        return Ok(Cow::Owned(values));
    }
    indicators
        .get_series(name)
        .map(Cow::Borrowed)
        .ok_or_else(|| PoolError::MissingIndicator(name.to_string()))
}

/// Compute indicators for one instrument and extract its candidates.
pub fn build_candidates(
    bars: &[Bar],
    indicators: &[Box<dyn Indicator>],
    predicate: &dyn AdmissionPredicate,
    layout: &PoolLayout,
) -> Result<Vec<Candidate>, PoolError> {
    let warmup = compute_warmup(indicators);
    let values = precompute_indicators(bars, indicators);
    extract_candidates(bars, &values, warmup, predicate, layout)
}

/// Extract candidates from precomputed indicator values.
///
/// Scans every index `i` with `warmup <= i < len - horizon`. An admitted index
/// is dropped if any captured value is non-finite, so every candidate in the
/// result has a complete snapshot and forward window.
pub fn extract_candidates(
    bars: &[Bar],
    indicators: &IndicatorValues,
    warmup: usize,
    predicate: &dyn AdmissionPredicate,
    layout: &PoolLayout,
) -> Result<Vec<Candidate>, PoolError> {
    let horizon = layout.horizon;
    if horizon == 0 {
        return Err(PoolError::ZeroHorizon);
    }

    let snapshot_cols = layout
        .snapshot_fields
        .iter()
        .map(|name| column(bars, indicators, name))
        .collect::<Result<Vec<_>, _>>()?;
    let window_cols = layout
        .window_fields
        .iter()
        .map(|name| column(bars, indicators, name))
        .collect::<Result<Vec<_>, _>>()?;

    let start = warmup.max(predicate.history());
    let required = start + horizon + 1;
    if bars.len() < required {
        return Err(PoolError::InsufficientHistory {
            bars: bars.len(),
            required,
            warmup: start,
            horizon,
        });
    }

    let mut candidates = Vec::new();
    for i in start..bars.len() - horizon {
        if !predicate.admit(bars, i, indicators) {
            continue;
        }
        let entry_price = bars[i].close;
        if !entry_price.is_finite() || entry_price <= 0.0 {
            continue;
        }

        let snapshot: Vec<f64> = snapshot_cols.iter().map(|col| col[i]).collect();
        if snapshot.iter().any(|v| !v.is_finite()) {
            continue;
        }

        let ahead: Vec<&[f64]> = window_cols
            .iter()
            .map(|col| &col[i + 1..i + 1 + horizon])
            .collect();
        if ahead.iter().any(|s| s.iter().any(|v| !v.is_finite())) {
            continue;
        }
        let Some(window) = ForwardWindow::from_series(horizon, &ahead) else {
            continue;
        };

        candidates.push(Candidate {
            entry_date: bars[i].date,
            entry_price,
            snapshot,
            window,
        });
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{Comparison, Condition, ConditionSet, Operand};
    use crate::indicators::{make_bars, Sma};

    fn admit_all(_: &[Bar], _: usize, _: &IndicatorValues) -> bool {
        true
    }

    #[test]
    fn layout_always_carries_price_window() {
        let layout = PoolLayout::new(5).with_window("k").with_window("close");
        assert_eq!(layout.window_index("close"), Some(WINDOW_CLOSE));
        assert_eq!(layout.window_index("low"), Some(WINDOW_LOW));
        assert_eq!(layout.window_index("high"), Some(WINDOW_HIGH));
        assert_eq!(layout.window_index("k"), Some(3));
        assert_eq!(layout.window_fields.len(), 4);
    }

    #[test]
    fn scan_range_respects_warmup_and_horizon() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
        let indicators: Vec<Box<dyn Indicator>> = vec![Box::new(Sma::new(3))];
        let layout = PoolLayout::new(2).with_snapshot("ma_3");
        let candidates = build_candidates(&bars, &indicators, &admit_all, &layout).unwrap();
        // warm-up 2, last admissible index 7 - 2 - 1 = 4
        let dates: Vec<_> = candidates.iter().map(|c| c.entry_date).collect();
        assert_eq!(dates, vec![bars[2].date, bars[3].date, bars[4].date]);
        assert_eq!(candidates[0].entry_price, 12.0);
        assert_eq!(candidates[0].snapshot, vec![11.0]);
        assert_eq!(candidates[0].window.series(WINDOW_CLOSE), &[13.0, 14.0]);
        assert_eq!(candidates[2].window.series(WINDOW_CLOSE), &[15.0, 16.0]);
    }

    #[test]
    fn windows_are_never_ragged() {
        let bars = make_bars(&[10.0; 20]);
        let layout = PoolLayout::new(4).with_window("volume");
        let candidates = build_candidates(&bars, &[], &admit_all, &layout).unwrap();
        assert_eq!(candidates.len(), 16);
        for c in &candidates {
            assert_eq!(c.window.horizon(), 4);
            assert_eq!(c.window.field_count(), 4);
        }
    }

    #[test]
    fn insufficient_history_is_an_error() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let indicators: Vec<Box<dyn Indicator>> = vec![Box::new(Sma::new(3))];
        let layout = PoolLayout::new(2);
        let err = build_candidates(&bars, &indicators, &admit_all, &layout).unwrap_err();
        assert!(matches!(err, PoolError::InsufficientHistory { required: 5, .. }));
    }

    #[test]
    fn unknown_layout_field_is_an_error() {
        let bars = make_bars(&[10.0; 10]);
        let layout = PoolLayout::new(2).with_snapshot("rsi_6");
        let err = build_candidates(&bars, &[], &admit_all, &layout).unwrap_err();
        assert_eq!(err, PoolError::MissingIndicator("rsi_6".into()));
    }

    #[test]
    fn zero_horizon_is_rejected() {
        let bars = make_bars(&[10.0; 10]);
        let err = build_candidates(&bars, &[], &admit_all, &PoolLayout::new(0)).unwrap_err();
        assert_eq!(err, PoolError::ZeroHorizon);
    }

    #[test]
    fn non_finite_window_values_drop_the_candidate() {
        let mut bars = make_bars(&[10.0; 8]);
        bars[5].turnover = f64::NAN;
        let layout = PoolLayout::new(2).with_window("turnover");
        let candidates = build_candidates(&bars, &[], &admit_all, &layout).unwrap();
        // indices 3 and 4 look ahead into bar 5
        let dates: Vec<_> = candidates.iter().map(|c| c.entry_date).collect();
        assert_eq!(dates, vec![bars[0].date, bars[1].date, bars[2].date, bars[5].date]);
    }

    #[test]
    fn predicate_selects_entries() {
        let bars = make_bars(&[10.0, 9.0, 11.0, 8.0, 12.0, 13.0, 14.0]);
        let set = ConditionSet::new(vec![Condition::new(
            "close",
            Comparison::Lt,
            Operand::Value(10.0),
        )]);
        let candidates = build_candidates(&bars, &[], &set, &PoolLayout::new(2)).unwrap();
        let prices: Vec<f64> = candidates.iter().map(|c| c.entry_price).collect();
        assert_eq!(prices, vec![9.0, 8.0]);
    }

    #[test]
    fn pool_concatenates_in_order() {
        let bars = make_bars(&[10.0; 5]);
        let layout = PoolLayout::new(2);
        let a = build_candidates(&bars, &[], &admit_all, &layout).unwrap();
        let b = build_candidates(&bars[..4], &[], &admit_all, &layout).unwrap();
        let mut pool = CandidatePool::new(layout);
        pool.extend(a.clone());
        pool.extend(b.clone());
        assert_eq!(pool.len(), a.len() + b.len());
        assert_eq!(&pool.candidates()[..a.len()], a.as_slice());
    }
}
