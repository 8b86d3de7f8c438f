//! Domain types for GridLab

pub mod bar;
pub mod candidate;
pub mod outcome;

pub use bar::{Bar, InstrumentSeries};
pub use candidate::{Candidate, ForwardWindow};
pub use outcome::{ExitReason, TradeOutcome};
