//! Exit rules and their decision matrices.
//!
//! Each enabled rule produces one boolean matrix with a row per selected
//! candidate and a column per held day. Matrices are OR-combined and scanned
//! left to right for the first triggered day.

use crate::domain::{Candidate, ExitReason};
use crate::pool::{WINDOW_HIGH, WINDOW_LOW};

/// An exit rule with its series resolved to window-field slots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitRule {
    /// `(low - entry) / entry <= level` on the day.
    StopLoss { level: f64 },
    /// `(high - entry) / entry >= level` on the day.
    TakeProfit { level: f64 },
    /// Armed once any high so far reached `entry * (1 + arm)`, the arming day
    /// included; then fires when the low touches the entry price.
    Breakeven { arm: f64 },
    /// `fast > level && fast < slow` on the day.
    Reversal { fast: usize, slow: usize, level: f64 },
    /// `series < below` on the day.
    Momentum { series: usize, below: f64 },
}

impl ExitRule {
    pub fn reason(&self) -> ExitReason {
        match self {
            Self::StopLoss { .. } => ExitReason::StopLoss,
            Self::TakeProfit { .. } => ExitReason::TakeProfit,
            Self::Breakeven { .. } => ExitReason::Breakeven,
            Self::Reversal { .. } => ExitReason::Reversal,
            Self::Momentum { .. } => ExitReason::Momentum,
        }
    }

    pub fn triggers(&self, candidate: &Candidate, day: usize) -> bool {
        let w = &candidate.window;
        let entry = candidate.entry_price;
        match *self {
            Self::StopLoss { level } => (w.series(WINDOW_LOW)[day] - entry) / entry <= level,
            Self::TakeProfit { level } => (w.series(WINDOW_HIGH)[day] - entry) / entry >= level,
            Self::Breakeven { arm } => {
                let best = w.series(WINDOW_HIGH)[..=day]
                    .iter()
                    .fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                (best - entry) / entry >= arm && w.series(WINDOW_LOW)[day] <= entry
            }
            Self::Reversal { fast, slow, level } => {
                let f = w.series(fast)[day];
                f > level && f < w.series(slow)[day]
            }
            Self::Momentum { series, below } => w.series(series)[day] < below,
        }
    }
}

/// Dense row-major boolean matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitMatrix {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
}

impl ExitMatrix {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![false; rows * cols],
        }
    }

    /// Evaluate `rule` for every candidate over the first `hold_days` days.
    pub fn build(rule: &ExitRule, candidates: &[&Candidate], hold_days: usize) -> Self {
        let mut cells = Vec::with_capacity(candidates.len() * hold_days);
        for candidate in candidates {
            cells.extend((0..hold_days).map(|day| rule.triggers(candidate, day)));
        }
        Self {
            rows: candidates.len(),
            cols: hold_days,
            cells,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.cells[row * self.cols + col]
    }

    /// Element-wise OR. Both matrices must have the same shape.
    pub fn or_assign(&mut self, other: &ExitMatrix) {
        assert_eq!(
            (self.rows, self.cols),
            (other.rows, other.cols),
            "exit matrix shape mismatch"
        );
        for (a, b) in self.cells.iter_mut().zip(&other.cells) {
            *a |= *b;
        }
    }

    /// First triggered column in `row`, or `None` when nothing fired.
    pub fn first_trigger(&self, row: usize) -> Option<usize> {
        let start = row * self.cols;
        self.cells[start..start + self.cols].iter().position(|&c| c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ForwardWindow;
    use crate::pool::{WINDOW_CLOSE, WINDOW_HIGH};
    use chrono::NaiveDate;

    fn candidate(entry: f64, close: &[f64], low: &[f64], k: &[f64], d: &[f64]) -> Candidate {
        priced(entry, close, low, close, k, d)
    }

    fn priced(
        entry: f64,
        close: &[f64],
        low: &[f64],
        high: &[f64],
        k: &[f64],
        d: &[f64],
    ) -> Candidate {
        let window = ForwardWindow::from_series(close.len(), &[close, low, high, k, d]).unwrap();
        Candidate {
            entry_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            entry_price: entry,
            snapshot: vec![],
            window,
        }
    }

    #[test]
    fn price_slots_are_fixed() {
        assert_eq!((WINDOW_CLOSE, WINDOW_LOW, WINDOW_HIGH), (0, 1, 2));
    }

    #[test]
    fn stop_loss_reads_the_low() {
        let c = candidate(10.0, &[10.0, 10.0], &[9.5, 9.0], &[0.0; 2], &[0.0; 2]);
        let rule = ExitRule::StopLoss { level: -0.10 };
        assert!(!rule.triggers(&c, 0));
        assert!(rule.triggers(&c, 1), "exactly at the stop triggers");
    }

    #[test]
    fn take_profit_reads_the_high() {
        let c = priced(
            10.0,
            &[10.5, 10.8],
            &[10.0, 10.4],
            &[10.9, 11.5],
            &[0.0; 2],
            &[0.0; 2],
        );
        let rule = ExitRule::TakeProfit { level: 0.15 };
        assert!(!rule.triggers(&c, 0), "close never matters, high 10.9 is short");
        assert!(rule.triggers(&c, 1), "exactly at the target triggers");
    }

    #[test]
    fn breakeven_arms_then_trails() {
        // day 0: high +5%, not armed; day 1: high +8% arms; day 2: pulls back
        // but holds above entry; day 3: low touches entry and fires.
        let c = priced(
            10.0,
            &[10.3, 10.6, 10.4, 10.1],
            &[9.6, 10.2, 10.1, 10.0],
            &[10.5, 10.8, 10.6, 10.3],
            &[0.0; 4],
            &[0.0; 4],
        );
        let rule = ExitRule::Breakeven { arm: 0.07 };
        assert!(!rule.triggers(&c, 0), "low below entry before arming is ignored");
        assert!(!rule.triggers(&c, 1));
        assert!(!rule.triggers(&c, 2));
        assert!(rule.triggers(&c, 3));
    }

    #[test]
    fn breakeven_can_arm_and_fire_on_one_day() {
        let c = priced(10.0, &[10.0], &[9.9], &[10.8], &[0.0], &[0.0]);
        assert!(ExitRule::Breakeven { arm: 0.07 }.triggers(&c, 0));
    }

    #[test]
    fn reversal_needs_level_and_cross() {
        let c = candidate(
            10.0,
            &[10.0; 3],
            &[10.0; 3],
            &[85.0, 85.0, 75.0],
            &[80.0, 90.0, 90.0],
        );
        let rule = ExitRule::Reversal { fast: 3, slow: 4, level: 80.0 };
        assert!(!rule.triggers(&c, 0), "k above d");
        assert!(rule.triggers(&c, 1));
        assert!(!rule.triggers(&c, 2), "k below level");
    }

    #[test]
    fn first_trigger_distinguishes_day_zero_from_none() {
        let c1 = candidate(10.0, &[10.0; 3], &[8.0, 10.0, 10.0], &[0.0; 3], &[0.0; 3]);
        let c2 = candidate(10.0, &[10.0; 3], &[10.0; 3], &[0.0; 3], &[0.0; 3]);
        let m = ExitMatrix::build(&ExitRule::StopLoss { level: -0.1 }, &[&c1, &c2], 3);
        assert_eq!(m.first_trigger(0), Some(0));
        assert_eq!(m.first_trigger(1), None);
    }

    #[test]
    fn or_combines_rules() {
        let c = candidate(
            10.0,
            &[10.0; 4],
            &[10.0, 10.0, 10.0, 8.0],
            &[50.0, 85.0, 50.0, 50.0],
            &[60.0, 90.0, 60.0, 60.0],
        );
        let rows = [&c];
        let mut any = ExitMatrix::new(1, 4);
        any.or_assign(&ExitMatrix::build(&ExitRule::StopLoss { level: -0.1 }, &rows, 4));
        assert_eq!(any.first_trigger(0), Some(3));
        any.or_assign(&ExitMatrix::build(
            &ExitRule::Reversal { fast: 3, slow: 4, level: 80.0 },
            &rows,
            4,
        ));
        assert_eq!(any.first_trigger(0), Some(1));
    }

    #[test]
    fn truncation_hides_later_days() {
        let c = candidate(10.0, &[10.0; 4], &[10.0, 10.0, 10.0, 8.0], &[0.0; 4], &[0.0; 4]);
        let m = ExitMatrix::build(&ExitRule::StopLoss { level: -0.1 }, &[&c], 3);
        assert_eq!(m.cols(), 3);
        assert_eq!(m.first_trigger(0), None);
    }
}
