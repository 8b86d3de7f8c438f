//! GridLab Core: domain types, indicators, candidate pools, grid evaluation.
//!
//! This crate contains the heart of the grid-search engine:
//! - Domain types (bars, candidates, trade outcomes)
//! - Causal indicator library with NaN warm-up
//! - Admission predicates (closures or configured condition sets)
//! - Candidate Pool Builder with fixed-length forward windows
//! - Grid Search Evaluator with prioritized first-trigger exits
//!
//! Nothing in this crate performs I/O or logging.

pub mod admission;
pub mod domain;
pub mod grid;
pub mod indicators;
pub mod pool;
pub mod precompute;
