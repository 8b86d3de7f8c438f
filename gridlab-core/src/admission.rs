//! Admission predicates: which bars qualify as candidate entries.
//!
//! A strategy is a value, not a code path. The engine takes any
//! [`AdmissionPredicate`]; closures implement it directly, and
//! [`ConditionSet`] is the configuration-driven implementation.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::indicators::IndicatorValues;

/// Boolean test of one bar, given the bar history and precomputed indicators.
///
/// Implementations must be pure and causal: only bars `..=index` may be read.
pub trait AdmissionPredicate: Send + Sync {
    fn admit(&self, bars: &[Bar], index: usize, indicators: &IndicatorValues) -> bool;

    /// Extra bars of history the predicate reads behind `index`.
    fn history(&self) -> usize {
        0
    }
}

impl<F> AdmissionPredicate for F
where
    F: Fn(&[Bar], usize, &IndicatorValues) -> bool + Send + Sync,
{
    fn admit(&self, bars: &[Bar], index: usize, indicators: &IndicatorValues) -> bool {
        self(bars, index, indicators)
    }
}

/// Resolve a named value at `index`: raw bar fields first, then indicators.
///
/// Returns `None` for unknown names or out-of-range indices; the value itself
/// may be NaN during warm-up.
pub fn lookup(bars: &[Bar], index: usize, indicators: &IndicatorValues, name: &str) -> Option<f64> {
    let bar = bars.get(index)?;
    bar.field(name).or_else(|| indicators.get(name, index))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparison {
    /// NaN on either side never compares true.
    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
        }
    }
}

/// Right-hand side of a condition: a constant or another named series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Value(f64),
    Field(String),
}

/// `field <op> rhs`, optionally required on each of the last `window` bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: Comparison,
    pub rhs: Operand,
    #[serde(default = "default_window")]
    pub window: usize,
}

fn default_window() -> usize {
    1
}

impl Condition {
    pub fn new(field: impl Into<String>, op: Comparison, rhs: Operand) -> Self {
        Self {
            field: field.into(),
            op,
            rhs,
            window: 1,
        }
    }

    pub fn over_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    fn holds_at(&self, bars: &[Bar], index: usize, indicators: &IndicatorValues) -> bool {
        let Some(lhs) = lookup(bars, index, indicators, &self.field) else {
            return false;
        };
        let rhs = match &self.rhs {
            Operand::Value(v) => *v,
            Operand::Field(name) => match lookup(bars, index, indicators, name) {
                Some(v) => v,
                None => return false,
            },
        };
        self.op.holds(lhs, rhs)
    }

    pub fn evaluate(&self, bars: &[Bar], index: usize, indicators: &IndicatorValues) -> bool {
        let window = self.window.max(1);
        if index + 1 < window {
            return false;
        }
        (index + 1 - window..=index).all(|j| self.holds_at(bars, j, indicators))
    }

    /// Every series name this condition reads.
    pub fn fields(&self) -> Vec<&str> {
        let mut names = vec![self.field.as_str()];
        if let Operand::Field(name) = &self.rhs {
            names.push(name.as_str());
        }
        names
    }
}

/// Conjunction of conditions. An empty set admits every bar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionSet {
    pub conditions: Vec<Condition>,
}

impl ConditionSet {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }
}

impl AdmissionPredicate for ConditionSet {
    fn admit(&self, bars: &[Bar], index: usize, indicators: &IndicatorValues) -> bool {
        self.conditions
            .iter()
            .all(|c| c.evaluate(bars, index, indicators))
    }

    fn history(&self) -> usize {
        self.conditions
            .iter()
            .map(|c| c.window.max(1) - 1)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    fn with_series(name: &str, values: Vec<f64>) -> IndicatorValues {
        let mut iv = IndicatorValues::new();
        iv.insert(name, values);
        iv
    }

    #[test]
    fn constant_threshold() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let iv = with_series("rsi", vec![f64::NAN, 30.0, 50.0]);
        let cond = Condition::new("rsi", Comparison::Lt, Operand::Value(45.0));
        assert!(!cond.evaluate(&bars, 0, &iv), "NaN never admits");
        assert!(cond.evaluate(&bars, 1, &iv));
        assert!(!cond.evaluate(&bars, 2, &iv));
    }

    #[test]
    fn series_against_series() {
        let bars = make_bars(&[10.0, 11.0]);
        let mut iv = with_series("k", vec![40.0, 60.0]);
        iv.insert("d", vec![50.0, 50.0]);
        let cond = Condition::new("k", Comparison::Gt, Operand::Field("d".into()));
        assert!(!cond.evaluate(&bars, 0, &iv));
        assert!(cond.evaluate(&bars, 1, &iv));
    }

    #[test]
    fn bar_fields_resolve_before_indicators() {
        let bars = make_bars(&[10.0, 21.0]);
        let iv = with_series("close", vec![0.0, 0.0]);
        let cond = Condition::new("close", Comparison::Gt, Operand::Value(20.0));
        assert!(cond.evaluate(&bars, 1, &iv));
    }

    #[test]
    fn windowed_condition_requires_every_bar() {
        let mut bars = make_bars(&[10.0, 10.0, 10.0, 10.0]);
        bars[0].turnover = 6.0;
        bars[1].turnover = 4.0;
        bars[2].turnover = 6.0;
        bars[3].turnover = 7.0;
        let iv = IndicatorValues::new();
        let cond = Condition::new("turnover", Comparison::Ge, Operand::Value(5.0)).over_window(2);
        assert!(!cond.evaluate(&bars, 0, &iv), "not enough history");
        assert!(!cond.evaluate(&bars, 2, &iv));
        assert!(cond.evaluate(&bars, 3, &iv));
    }

    #[test]
    fn unknown_field_never_admits() {
        let bars = make_bars(&[10.0]);
        let cond = Condition::new("nope", Comparison::Gt, Operand::Value(0.0));
        assert!(!cond.evaluate(&bars, 0, &IndicatorValues::new()));
    }

    #[test]
    fn condition_set_is_conjunction() {
        let bars = make_bars(&[10.0, 11.0]);
        let mut iv = with_series("pot", vec![12.0, 12.0]);
        iv.insert("rsi", vec![30.0, 50.0]);
        let set = ConditionSet::new(vec![
            Condition::new("pot", Comparison::Gt, Operand::Value(10.0)),
            Condition::new("rsi", Comparison::Lt, Operand::Value(45.0)),
        ]);
        assert!(set.admit(&bars, 0, &iv));
        assert!(!set.admit(&bars, 1, &iv));
        assert!(ConditionSet::default().admit(&bars, 1, &iv));
    }

    #[test]
    fn history_is_longest_window() {
        let set = ConditionSet::new(vec![
            Condition::new("turnover", Comparison::Ge, Operand::Value(5.0)).over_window(3),
            Condition::new("close", Comparison::Le, Operand::Value(20.0)),
        ]);
        assert_eq!(set.history(), 2);
    }

    #[test]
    fn closures_are_predicates() {
        let bars = make_bars(&[10.0, 11.0]);
        let rising = |bars: &[Bar], i: usize, _: &IndicatorValues| {
            i > 0 && bars[i].close > bars[i - 1].close
        };
        let pred: &dyn AdmissionPredicate = &rising;
        assert!(!pred.admit(&bars, 0, &IndicatorValues::new()));
        assert!(pred.admit(&bars, 1, &IndicatorValues::new()));
    }

    #[test]
    fn condition_deserializes_from_toml_shape() {
        let json = r#"{"field": "k", "op": "gt", "rhs": "d"}"#;
        let cond: Condition = serde_json::from_str(json).unwrap();
        assert_eq!(cond.rhs, Operand::Field("d".into()));
        assert_eq!(cond.window, 1);
        let json = r#"{"field": "pot", "op": "ge", "rhs": 10.0, "window": 3}"#;
        let cond: Condition = serde_json::from_str(json).unwrap();
        assert_eq!(cond.rhs, Operand::Value(10.0));
        assert_eq!(cond.window, 3);
    }
}
