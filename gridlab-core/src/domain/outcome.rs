//! Trade outcomes produced by replaying a candidate under one parameter combination.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which rule closed the trade.
///
/// Variant order is the tie-break priority when several rules fire on the
/// same day: the stop-loss always wins, a take-profit beats the breakeven
/// stop, and price exits beat indicator exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Breakeven,
    Reversal,
    Momentum,
    HorizonExhausted,
}

impl ExitReason {
    /// Every reason, in priority order.
    pub const ALL: [ExitReason; 6] = [
        ExitReason::StopLoss,
        ExitReason::TakeProfit,
        ExitReason::Breakeven,
        ExitReason::Reversal,
        ExitReason::Momentum,
        ExitReason::HorizonExhausted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StopLoss => "stop_loss",
            Self::TakeProfit => "take_profit",
            Self::Breakeven => "breakeven",
            Self::Reversal => "reversal",
            Self::Momentum => "momentum",
            Self::HorizonExhausted => "horizon",
        }
    }
}

/// Result of one candidate under one parameter combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    /// Zero-based day within the forward window on which an exit rule fired.
    /// `None` when the trade ran to the end of its holding period.
    pub exit_day: Option<usize>,
    /// Realized return as a signed fraction.
    pub return_pct: f64,
    pub exit: ExitReason,
    /// Best high over the full holding period relative to entry, regardless
    /// of when the trade actually closed.
    pub max_excursion: f64,
}
