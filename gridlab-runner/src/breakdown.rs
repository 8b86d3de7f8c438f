//! Per-year breakdown of one combination's trades.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use gridlab_core::domain::TradeOutcome;
use gridlab_core::grid::TradeStats;

/// Statistics for trades entered in one calendar year. `year` is `None` for
/// the all-years total row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearRow {
    pub year: Option<i32>,
    pub stats: TradeStats,
}

/// Group outcomes by entry year, oldest first, followed by a total row.
///
/// Returns an empty vector when there are no outcomes.
pub fn yearly_breakdown(outcomes: &[TradeOutcome]) -> Vec<YearRow> {
    if outcomes.is_empty() {
        return Vec::new();
    }

    let mut by_year: BTreeMap<i32, Vec<TradeOutcome>> = BTreeMap::new();
    for o in outcomes {
        by_year.entry(o.entry_date.year()).or_default().push(o.clone());
    }

    let mut rows: Vec<YearRow> = by_year
        .into_iter()
        .map(|(year, trades)| YearRow {
            year: Some(year),
            stats: TradeStats::from_outcomes(&trades),
        })
        .collect();

    rows.push(YearRow {
        year: None,
        stats: TradeStats::from_outcomes(outcomes),
    });
    rows
}
