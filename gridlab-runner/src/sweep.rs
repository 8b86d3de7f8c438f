//! Sweep orchestration: pool building, batched grid evaluation, ranking.

use chrono::NaiveDate;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use gridlab_core::domain::TradeOutcome;
use gridlab_core::grid::{CombinationResult, GridEvaluator, ParameterCombination, ParameterGrid};
use gridlab_core::pool::CandidatePool;

use crate::config::{ConfigError, RunId, SweepConfig};
use crate::coordinator::{build_pool, Contribution, InstrumentFailure, InstrumentSource};
use crate::data_loader::LoadError;
use crate::fitness::RankingMetric;
use crate::leaderboard::rank;

/// Errors that stop a sweep. Per-instrument problems never do.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("symbol '{0}' appears more than once in the universe")]
    DuplicateSymbol(String),

    #[error("combination index {index} is outside the grid (size {size})")]
    NoSuchCombination { index: usize, size: usize },
}

/// Evaluate `grid` in fixed-size batches of combination indices, in parallel.
///
/// Each batch is independent and stateless; results come back in index order.
pub fn evaluate_batched(
    pool: &CandidatePool,
    grid: &ParameterGrid,
    min_trades: usize,
    batch_size: usize,
    workers: usize,
) -> Result<Vec<CombinationResult>, SweepError> {
    let batch_size = batch_size.max(1);
    let total = grid.len();
    let batches = total.div_ceil(batch_size);
    let evaluator = GridEvaluator::new(pool, min_trades);

    let threads = ThreadPoolBuilder::new().num_threads(workers).build()?;
    info!(
        combinations = total,
        batches,
        batch_size,
        candidates = pool.len(),
        "Evaluating parameter grid"
    );

    let per_batch: Vec<Vec<CombinationResult>> = threads.install(|| {
        (0..batches)
            .into_par_iter()
            .map(|b| {
                let start = b * batch_size;
                evaluator.evaluate_range(grid, start..(start + batch_size).min(total))
            })
            .collect()
    });

    Ok(per_batch.into_iter().flatten().collect())
}

/// Everything a sweep produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub run_id: RunId,
    pub created: NaiveDate,
    pub dataset_hash: String,
    pub config: SweepConfig,
    pub contributions: Vec<Contribution>,
    pub failures: Vec<InstrumentFailure>,
    pub candidates: usize,
    pub combinations: usize,
    /// Combinations that met the trade-count floor.
    pub qualifying: usize,
    pub ranking: RankingMetric,
    /// Best `top_k` results, best first.
    pub ranked: Vec<CombinationResult>,
}

impl SweepReport {
    /// Summary line for the "nothing qualified" case.
    pub fn empty_message(&self) -> Option<String> {
        self.ranked.is_empty().then(|| {
            format!(
                "no combination met the minimum of {} trades ({} candidates, {} combinations)",
                self.config.engine.min_trades, self.candidates, self.combinations
            )
        })
    }
}

/// Run a full sweep over `sources`.
pub fn run_sweep(
    config: &SweepConfig,
    sources: &[InstrumentSource],
    created: NaiveDate,
) -> Result<SweepReport, SweepError> {
    let plan = config.plan()?;
    let build = build_pool(sources, &plan, config.engine.workers)?;
    let run_id = config.run_id(&build.dataset_hash)?;

    let results = evaluate_batched(
        &build.pool,
        &plan.grid,
        plan.min_trades,
        config.engine.batch_size,
        config.engine.workers,
    )?;
    let qualifying = results.len();
    let ranked = rank(results, config.engine.ranking, config.engine.top_k);

    info!(
        %run_id,
        qualifying,
        kept = ranked.len(),
        ranking = config.engine.ranking.as_str(),
        "Sweep complete"
    );

    Ok(SweepReport {
        run_id,
        created,
        dataset_hash: build.dataset_hash,
        config: config.clone(),
        contributions: build.contributions,
        failures: build.failures,
        candidates: build.pool.len(),
        combinations: plan.grid.len(),
        qualifying,
        ranking: config.engine.ranking,
        ranked,
    })
}

/// Trades of one combination, for replay and the yearly breakdown.
pub struct Replay {
    pub index: usize,
    pub combination: ParameterCombination,
    pub outcomes: Vec<TradeOutcome>,
    pub failures: Vec<InstrumentFailure>,
}

/// Rebuild the pool and replay the combination at `index`, ignoring the floor.
pub fn replay(
    config: &SweepConfig,
    sources: &[InstrumentSource],
    index: usize,
) -> Result<Replay, SweepError> {
    let plan = config.plan()?;
    let combination = plan
        .grid
        .combination(index)
        .ok_or_else(|| SweepError::NoSuchCombination {
            index,
            size: plan.grid.len(),
        })?;
    let build = build_pool(sources, &plan, config.engine.workers)?;
    let evaluator = GridEvaluator::new(&build.pool, plan.min_trades);
    let outcomes = evaluator.outcomes(&plan.grid, &combination);
    info!(index, trades = outcomes.len(), "Combination replayed");

    Ok(Replay {
        index,
        combination,
        outcomes,
        failures: build.failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridlab_core::domain::{Candidate, ForwardWindow};
    use gridlab_core::grid::{Bound, EntryDimension};
    use gridlab_core::pool::PoolLayout;

    fn pool(n: usize) -> CandidatePool {
        let layout = PoolLayout::new(3).with_snapshot("rsi");
        let mut pool = CandidatePool::new(layout);
        let date = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        pool.extend(
            (0..n)
                .map(|i| {
                    let c = 10.0 + (i % 5) as f64 * 0.1;
                    let close = [c, c + 0.1, c - 0.2];
                    Candidate {
                        entry_date: date,
                        entry_price: 10.0,
                        snapshot: vec![(i % 50) as f64],
                        window: ForwardWindow::from_series(3, &[&close, &close, &close]).unwrap(),
                    }
                })
                .collect(),
        );
        pool
    }

    fn grid() -> ParameterGrid {
        ParameterGrid {
            entry: vec![EntryDimension {
                field: "rsi".into(),
                bound: Bound::Max,
                values: (0..20).map(|v| v as f64 * 2.5).collect(),
            }],
            hold_days: vec![1, 2, 3],
            stop_loss: vec![-0.01, -0.05],
            take_profit: vec![],
            breakeven_arm: vec![],
            reversal_exit: None,
            momentum_exit: None,
        }
    }

    #[test]
    fn batched_matches_sequential() {
        let pool = pool(200);
        let g = grid();
        let sequential = GridEvaluator::new(&pool, 10).evaluate(&g);
        for batch in [1, 7, 64, 1000] {
            let batched = evaluate_batched(&pool, &g, 10, batch, 3).unwrap();
            assert_eq!(batched, sequential, "batch size {batch}");
        }
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let pool = pool(20);
        let results = evaluate_batched(&pool, &grid(), 1, 0, 1).unwrap();
        assert_eq!(results, GridEvaluator::new(&pool, 1).evaluate(&grid()));
    }

    #[test]
    fn empty_grid_evaluates_nothing() {
        let mut g = grid();
        g.hold_days.clear();
        assert!(evaluate_batched(&pool(20), &g, 1, 4, 1).unwrap().is_empty());
    }
}
