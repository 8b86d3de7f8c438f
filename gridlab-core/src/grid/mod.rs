//! Grid Search Evaluator.
//!
//! A [`ParameterGrid`] is a Cartesian product of named dimensions. Each
//! point is a [`ParameterCombination`], addressable by its index so large
//! grids can be evaluated in batches without materializing every point.

pub mod evaluator;
pub mod exit;
pub mod stats;

pub use evaluator::{CombinationResult, ExitCounts, GridEvaluator};
pub use exit::{ExitMatrix, ExitRule};
pub use stats::TradeStats;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pool::PoolLayout;

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("grid dimension '{0}' has no values")]
    EmptyDimension(String),

    #[error("grid references '{0}', which is not captured by the pool layout")]
    UnknownField(String),

    #[error("hold_days {hold} must be between 1 and the horizon {horizon}")]
    HoldOutOfRange { hold: usize, horizon: usize },

    #[error("stop_loss {0} must be a negative fraction")]
    InvalidStopLoss(f64),

    #[error("take_profit {0} must be a positive fraction")]
    InvalidTakeProfit(f64),

    #[error("breakeven_arm {0} must be a positive fraction")]
    InvalidBreakevenArm(f64),
}

/// Which side of an entry threshold admits a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    /// Snapshot value must be at least the threshold.
    Min,
    /// Snapshot value must be at most the threshold.
    Max,
}

impl Bound {
    pub fn admits(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Min => value >= threshold,
            Self::Max => value <= threshold,
        }
    }
}

/// An entry-side threshold swept over `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDimension {
    pub field: String,
    pub bound: Bound,
    pub values: Vec<f64>,
}

impl EntryDimension {
    pub fn label(&self) -> String {
        match self.bound {
            Bound::Min => format!("min_{}", self.field),
            Bound::Max => format!("max_{}", self.field),
        }
    }
}

/// Exit when `fast > level && fast < slow`, e.g. K above an overbought level
/// while crossing under D.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversalExit {
    pub fast: String,
    pub slow: String,
    pub levels: Vec<f64>,
}

/// Exit when `series < below`, e.g. MACD histogram turning negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumExit {
    pub series: String,
    #[serde(default)]
    pub below: f64,
    /// Swept on/off values. Defaults to always on.
    #[serde(default = "default_enabled")]
    pub enabled: Vec<bool>,
}

fn default_enabled() -> Vec<bool> {
    vec![true]
}

/// The swept parameter space.
///
/// Dimension order, outermost first: entry dimensions, `hold_days`,
/// `stop_loss`, `take_profit`, `breakeven_arm`, reversal level, momentum
/// toggle. An empty level list or an absent exit section leaves that rule
/// disabled for every combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    #[serde(default)]
    pub entry: Vec<EntryDimension>,
    pub hold_days: Vec<usize>,
    #[serde(default)]
    pub stop_loss: Vec<f64>,
    /// Target gains; the trade closes at the target once the high reaches it.
    #[serde(default)]
    pub take_profit: Vec<f64>,
    /// Gains on the high that move the stop up to the entry price.
    #[serde(default)]
    pub breakeven_arm: Vec<f64>,
    #[serde(default)]
    pub reversal_exit: Option<ReversalExit>,
    #[serde(default)]
    pub momentum_exit: Option<MomentumExit>,
}

/// One point of the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterCombination {
    /// Thresholds aligned with `ParameterGrid::entry`.
    pub entry: Vec<f64>,
    pub hold_days: usize,
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
    #[serde(default)]
    pub breakeven_arm: Option<f64>,
    pub reversal_level: Option<f64>,
    pub momentum_exit: bool,
}

impl ParameterGrid {
    fn radices(&self) -> Vec<usize> {
        let mut radices: Vec<usize> = self.entry.iter().map(|d| d.values.len()).collect();
        radices.push(self.hold_days.len());
        radices.push(self.stop_loss.len().max(1));
        radices.push(self.take_profit.len().max(1));
        radices.push(self.breakeven_arm.len().max(1));
        radices.push(
            self.reversal_exit
                .as_ref()
                .map_or(1, |r| r.levels.len().max(1)),
        );
        radices.push(
            self.momentum_exit
                .as_ref()
                .map_or(1, |m| m.enabled.len().max(1)),
        );
        radices
    }

    /// Number of combinations.
    pub fn len(&self) -> usize {
        self.radices().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The combination at `index`, with the last dimension varying fastest.
    pub fn combination(&self, index: usize) -> Option<ParameterCombination> {
        let radices = self.radices();
        let total: usize = radices.iter().product();
        if index >= total {
            return None;
        }

        let mut digits = vec![0usize; radices.len()];
        let mut rest = index;
        for (digit, &radix) in digits.iter_mut().zip(&radices).rev() {
            *digit = rest % radix;
            rest /= radix;
        }

        let n = self.entry.len();
        let entry = self
            .entry
            .iter()
            .zip(&digits[..n])
            .map(|(dim, &d)| dim.values[d])
            .collect();

        Some(ParameterCombination {
            entry,
            hold_days: self.hold_days[digits[n]],
            stop_loss: self.stop_loss.get(digits[n + 1]).copied(),
            take_profit: self.take_profit.get(digits[n + 2]).copied(),
            breakeven_arm: self.breakeven_arm.get(digits[n + 3]).copied(),
            reversal_level: self
                .reversal_exit
                .as_ref()
                .and_then(|r| r.levels.get(digits[n + 4]).copied()),
            momentum_exit: self
                .momentum_exit
                .as_ref()
                .and_then(|m| m.enabled.get(digits[n + 5]).copied())
                .unwrap_or(false),
        })
    }

    /// Iterate every combination in index order.
    pub fn iter(&self) -> impl Iterator<Item = ParameterCombination> + '_ {
        (0..self.len()).filter_map(move |i| self.combination(i))
    }

    /// Column labels for the entry thresholds.
    pub fn entry_labels(&self) -> Vec<String> {
        self.entry.iter().map(EntryDimension::label).collect()
    }

    /// Check every referenced field against `layout` and every value range.
    pub fn validate(&self, layout: &PoolLayout) -> Result<(), GridError> {
        for dim in &self.entry {
            if dim.values.is_empty() {
                return Err(GridError::EmptyDimension(dim.label()));
            }
            if layout.snapshot_index(&dim.field).is_none() {
                return Err(GridError::UnknownField(dim.field.clone()));
            }
        }

        if self.hold_days.is_empty() {
            return Err(GridError::EmptyDimension("hold_days".into()));
        }
        if let Some(&hold) = self
            .hold_days
            .iter()
            .find(|&&h| h == 0 || h > layout.horizon)
        {
            return Err(GridError::HoldOutOfRange {
                hold,
                horizon: layout.horizon,
            });
        }

        if let Some(&stop) = self.stop_loss.iter().find(|s| !s.is_finite() || **s >= 0.0) {
            return Err(GridError::InvalidStopLoss(stop));
        }
        if let Some(&target) = self.take_profit.iter().find(|t| !t.is_finite() || **t <= 0.0) {
            return Err(GridError::InvalidTakeProfit(target));
        }
        if let Some(&arm) = self.breakeven_arm.iter().find(|a| !a.is_finite() || **a <= 0.0) {
            return Err(GridError::InvalidBreakevenArm(arm));
        }

        if let Some(reversal) = &self.reversal_exit {
            if reversal.levels.is_empty() {
                return Err(GridError::EmptyDimension("reversal_exit.levels".into()));
            }
            for name in [&reversal.fast, &reversal.slow] {
                if layout.window_index(name).is_none() {
                    return Err(GridError::UnknownField(name.clone()));
                }
            }
        }

        if let Some(momentum) = &self.momentum_exit {
            if momentum.enabled.is_empty() {
                return Err(GridError::EmptyDimension("momentum_exit.enabled".into()));
            }
            if layout.window_index(&momentum.series).is_none() {
                return Err(GridError::UnknownField(momentum.series.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> ParameterGrid {
        ParameterGrid {
            entry: vec![
                EntryDimension {
                    field: "pot".into(),
                    bound: Bound::Min,
                    values: vec![15.0, 20.0],
                },
                EntryDimension {
                    field: "rsi".into(),
                    bound: Bound::Max,
                    values: vec![30.0, 35.0, 40.0],
                },
            ],
            hold_days: vec![10, 20],
            stop_loss: vec![-0.07, -0.1],
            take_profit: vec![],
            breakeven_arm: vec![],
            reversal_exit: Some(ReversalExit {
                fast: "k".into(),
                slow: "d".into(),
                levels: vec![80.0],
            }),
            momentum_exit: None,
        }
    }

    fn layout() -> PoolLayout {
        PoolLayout::new(35)
            .with_snapshot("pot")
            .with_snapshot("rsi")
            .with_window("k")
            .with_window("d")
            .with_window("hist")
    }

    #[test]
    fn len_is_product_of_dimensions() {
        assert_eq!(grid().len(), 2 * 3 * 2 * 2);
    }

    #[test]
    fn unranking_matches_nested_loops() {
        let g = grid();
        let mut expected = Vec::new();
        for &pot in &[15.0, 20.0] {
            for &rsi in &[30.0, 35.0, 40.0] {
                for &hold in &[10, 20] {
                    for &stop in &[-0.07, -0.1] {
                        expected.push(ParameterCombination {
                            entry: vec![pot, rsi],
                            hold_days: hold,
                            stop_loss: Some(stop),
                            take_profit: None,
                            breakeven_arm: None,
                            reversal_level: Some(80.0),
                            momentum_exit: false,
                        });
                    }
                }
            }
        }
        let actual: Vec<_> = g.iter().collect();
        assert_eq!(actual, expected);
        assert!(g.combination(g.len()).is_none());
    }

    #[test]
    fn disabled_rules_yield_none() {
        let g = ParameterGrid {
            entry: vec![],
            hold_days: vec![5],
            stop_loss: vec![],
            take_profit: vec![],
            breakeven_arm: vec![],
            reversal_exit: None,
            momentum_exit: None,
        };
        assert_eq!(g.len(), 1);
        let c = g.combination(0).unwrap();
        assert_eq!(c.stop_loss, None);
        assert_eq!(c.take_profit, None);
        assert_eq!(c.breakeven_arm, None);
        assert_eq!(c.reversal_level, None);
        assert!(!c.momentum_exit);
    }

    #[test]
    fn momentum_toggle_is_swept() {
        let mut g = grid();
        g.momentum_exit = Some(MomentumExit {
            series: "hist".into(),
            below: 0.0,
            enabled: vec![false, true],
        });
        assert_eq!(g.len(), 48);
        assert!(!g.combination(0).unwrap().momentum_exit);
        assert!(g.combination(1).unwrap().momentum_exit);
    }

    #[test]
    fn price_exit_levels_sit_between_stop_and_reversal() {
        let mut g = grid();
        g.take_profit = vec![0.1, 0.2];
        g.breakeven_arm = vec![0.07];
        assert_eq!(g.len(), 2 * 3 * 2 * 2 * 2);
        // take_profit varies faster than stop_loss
        let c = g.combination(1).unwrap();
        assert_eq!((c.stop_loss, c.take_profit), (Some(-0.07), Some(0.2)));
        let c = g.combination(2).unwrap();
        assert_eq!((c.stop_loss, c.take_profit), (Some(-0.1), Some(0.1)));
        assert_eq!(c.breakeven_arm, Some(0.07));
    }

    #[test]
    fn empty_entry_dimension_empties_grid() {
        let mut g = grid();
        g.entry[0].values.clear();
        assert!(g.is_empty());
        assert_eq!(g.validate(&layout()), Err(GridError::EmptyDimension("min_pot".into())));
    }

    #[test]
    fn validate_accepts_consistent_grid() {
        assert_eq!(grid().validate(&layout()), Ok(()));
    }

    #[test]
    fn validate_rejects_unknown_fields() {
        let mut g = grid();
        g.entry[1].field = "cci".into();
        assert_eq!(g.validate(&layout()), Err(GridError::UnknownField("cci".into())));

        let mut g = grid();
        g.reversal_exit.as_mut().unwrap().slow = "j".into();
        assert_eq!(g.validate(&layout()), Err(GridError::UnknownField("j".into())));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut g = grid();
        g.hold_days = vec![10, 36];
        assert_eq!(
            g.validate(&layout()),
            Err(GridError::HoldOutOfRange { hold: 36, horizon: 35 })
        );

        let mut g = grid();
        g.stop_loss = vec![0.05];
        assert_eq!(g.validate(&layout()), Err(GridError::InvalidStopLoss(0.05)));

        let mut g = grid();
        g.take_profit = vec![0.1, -0.1];
        assert_eq!(g.validate(&layout()), Err(GridError::InvalidTakeProfit(-0.1)));

        let mut g = grid();
        g.breakeven_arm = vec![0.0];
        assert_eq!(g.validate(&layout()), Err(GridError::InvalidBreakevenArm(0.0)));
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(Bound::Min.admits(15.0, 15.0));
        assert!(Bound::Max.admits(30.0, 30.0));
        assert!(!Bound::Min.admits(14.9, 15.0));
        assert!(!Bound::Max.admits(30.1, 30.0));
    }
}
