//! Grid evaluation over a shared candidate pool.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::exit::{ExitMatrix, ExitRule};
use super::stats::TradeStats;
use super::{ParameterCombination, ParameterGrid};
use crate::domain::{Candidate, ExitReason, TradeOutcome};
use crate::pool::{CandidatePool, WINDOW_CLOSE, WINDOW_HIGH};

/// How many trades each rule closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitCounts {
    pub stop_loss: usize,
    #[serde(default)]
    pub take_profit: usize,
    #[serde(default)]
    pub breakeven: usize,
    pub reversal: usize,
    pub momentum: usize,
    pub horizon: usize,
}

impl ExitCounts {
    pub fn record(&mut self, reason: ExitReason) {
        match reason {
            ExitReason::StopLoss => self.stop_loss += 1,
            ExitReason::TakeProfit => self.take_profit += 1,
            ExitReason::Breakeven => self.breakeven += 1,
            ExitReason::Reversal => self.reversal += 1,
            ExitReason::Momentum => self.momentum += 1,
            ExitReason::HorizonExhausted => self.horizon += 1,
        }
    }

    pub fn get(&self, reason: ExitReason) -> usize {
        match reason {
            ExitReason::StopLoss => self.stop_loss,
            ExitReason::TakeProfit => self.take_profit,
            ExitReason::Breakeven => self.breakeven,
            ExitReason::Reversal => self.reversal,
            ExitReason::Momentum => self.momentum,
            ExitReason::HorizonExhausted => self.horizon,
        }
    }
}

/// Statistics of one combination that met the trade-count floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationResult {
    /// Position of the combination in its grid.
    pub index: usize,
    pub combination: ParameterCombination,
    pub stats: TradeStats,
    pub exit_counts: ExitCounts,
}

/// Evaluates parameter combinations against one immutable pool.
///
/// The evaluator holds no mutable state, so it can be shared across threads
/// and any index range evaluated independently.
pub struct GridEvaluator<'a> {
    pool: &'a CandidatePool,
    min_trades: usize,
}

impl<'a> GridEvaluator<'a> {
    pub fn new(pool: &'a CandidatePool, min_trades: usize) -> Self {
        Self { pool, min_trades }
    }

    /// Evaluate every combination of `grid`, in index order.
    pub fn evaluate(&self, grid: &ParameterGrid) -> Vec<CombinationResult> {
        self.evaluate_range(grid, 0..grid.len())
    }

    /// Evaluate the combinations whose indices fall in `range`.
    ///
    /// Combinations below the trade-count floor are omitted.
    pub fn evaluate_range(&self, grid: &ParameterGrid, range: Range<usize>) -> Vec<CombinationResult> {
        let end = range.end.min(grid.len());
        (range.start..end)
            .filter_map(|index| {
                let combination = grid.combination(index)?;
                self.evaluate_one(grid, index, combination)
            })
            .collect()
    }

    fn evaluate_one(
        &self,
        grid: &ParameterGrid,
        index: usize,
        combination: ParameterCombination,
    ) -> Option<CombinationResult> {
        let selected = self.select(grid, &combination);
        if selected.is_empty() || selected.len() < self.min_trades {
            return None;
        }

        let outcomes = self.resolve(grid, &combination, &selected);
        let mut exit_counts = ExitCounts::default();
        for outcome in &outcomes {
            exit_counts.record(outcome.exit);
        }

        Some(CombinationResult {
            index,
            stats: TradeStats::from_outcomes(&outcomes),
            combination,
            exit_counts,
        })
    }

    /// Per-trade outcomes of one combination, ignoring the trade-count floor.
    pub fn outcomes(
        &self,
        grid: &ParameterGrid,
        combination: &ParameterCombination,
    ) -> Vec<TradeOutcome> {
        let selected = self.select(grid, combination);
        self.resolve(grid, combination, &selected)
    }

    /// Candidates passing every entry threshold of `combination`.
    pub fn select(
        &self,
        grid: &ParameterGrid,
        combination: &ParameterCombination,
    ) -> Vec<&'a Candidate> {
        let layout = self.pool.layout();
        let filters: Option<Vec<_>> = grid
            .entry
            .iter()
            .zip(&combination.entry)
            .map(|(dim, &threshold)| {
                layout
                    .snapshot_index(&dim.field)
                    .map(|slot| (slot, dim.bound, threshold))
            })
            .collect();
        // Unvalidated grids referencing uncaptured fields select nothing.
        let Some(filters) = filters else {
            return Vec::new();
        };

        self.pool
            .candidates()
            .iter()
            .filter(|c| {
                filters
                    .iter()
                    .all(|&(slot, bound, threshold)| bound.admits(c.snapshot[slot], threshold))
            })
            .collect()
    }

    /// Enabled rules of `combination`, in priority order.
    fn rules(&self, grid: &ParameterGrid, combination: &ParameterCombination) -> Vec<ExitRule> {
        let layout = self.pool.layout();
        let mut rules = Vec::with_capacity(5);

        if let Some(level) = combination.stop_loss {
            rules.push(ExitRule::StopLoss { level });
        }
        if let Some(level) = combination.take_profit {
            rules.push(ExitRule::TakeProfit { level });
        }
        if let Some(arm) = combination.breakeven_arm {
            rules.push(ExitRule::Breakeven { arm });
        }
        if let (Some(level), Some(reversal)) = (combination.reversal_level, &grid.reversal_exit) {
            if let (Some(fast), Some(slow)) = (
                layout.window_index(&reversal.fast),
                layout.window_index(&reversal.slow),
            ) {
                rules.push(ExitRule::Reversal { fast, slow, level });
            }
        }
        if combination.momentum_exit {
            if let Some(momentum) = &grid.momentum_exit {
                if let Some(series) = layout.window_index(&momentum.series) {
                    rules.push(ExitRule::Momentum {
                        series,
                        below: momentum.below,
                    });
                }
            }
        }

        debug_assert!(rules.windows(2).all(|w| w[0].reason() < w[1].reason()));
        rules
    }

    fn resolve(
        &self,
        grid: &ParameterGrid,
        combination: &ParameterCombination,
        selected: &[&Candidate],
    ) -> Vec<TradeOutcome> {
        let hold = combination.hold_days.min(self.pool.layout().horizon);
        if hold == 0 {
            return Vec::new();
        }

        let rules = self.rules(grid, combination);
        let matrices: Vec<ExitMatrix> = rules
            .iter()
            .map(|rule| ExitMatrix::build(rule, selected, hold))
            .collect();
        let mut any = ExitMatrix::new(selected.len(), hold);
        for m in &matrices {
            any.or_assign(m);
        }

        selected
            .iter()
            .enumerate()
            .map(|(row, candidate)| {
                let closes = candidate.window.series(WINDOW_CLOSE);
                let entry = candidate.entry_price;
                let best_high = candidate.window.series(WINDOW_HIGH)[..hold]
                    .iter()
                    .fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                // Rules are in priority order, so the first match wins ties.
                let fired = any.first_trigger(row).and_then(|day| {
                    rules
                        .iter()
                        .zip(&matrices)
                        .find(|(_, m)| m.get(row, day))
                        .map(|(rule, _)| (day, *rule))
                });
                let (exit_day, exit, return_pct) = match fired {
                    // Price exits fill at their own level, not at the close.
                    Some((day, ExitRule::StopLoss { level })) => {
                        (Some(day), ExitReason::StopLoss, level)
                    }
                    Some((day, ExitRule::TakeProfit { level })) => {
                        (Some(day), ExitReason::TakeProfit, level)
                    }
                    Some((day, ExitRule::Breakeven { .. })) => {
                        (Some(day), ExitReason::Breakeven, 0.0)
                    }
                    Some((day, rule)) => (Some(day), rule.reason(), (closes[day] - entry) / entry),
                    None => (
                        None,
                        ExitReason::HorizonExhausted,
                        (closes[hold - 1] - entry) / entry,
                    ),
                };
                TradeOutcome {
                    entry_date: candidate.entry_date,
                    entry_price: entry,
                    exit_day,
                    return_pct,
                    exit,
                    max_excursion: (best_high - entry) / entry,
                }
            })
            .collect()
    }
}
