//! Parallel Coordinator: fan out per-instrument work, merge the pool.
//!
//! Each instrument is one task: load bars, compute indicators, extract
//! candidates. Tasks share nothing mutable. A failing task contributes no
//! candidates and is recorded as an [`InstrumentFailure`]; its siblings are
//! unaffected. Results are merged in symbol order, so the pool does not
//! depend on task completion order.

use std::borrow::Cow;
use std::path::PathBuf;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use gridlab_core::domain::InstrumentSeries;
use gridlab_core::pool::{build_candidates, CandidatePool, PoolError};

use crate::config::{EnginePlan, Frequency};
use crate::data_loader::{load_csv, series_hash, symbol_for, LoadError};
use crate::sweep::SweepError;

/// Where an instrument's bars come from.
#[derive(Debug, Clone)]
pub enum InstrumentSource {
    Csv(PathBuf),
    Memory(InstrumentSeries),
}

impl InstrumentSource {
    pub fn symbol(&self) -> String {
        match self {
            Self::Csv(path) => symbol_for(path),
            Self::Memory(series) => series.symbol.clone(),
        }
    }

    fn load(&self) -> Result<Cow<'_, InstrumentSeries>, LoadError> {
        match self {
            Self::Csv(path) => load_csv(path).map(Cow::Owned),
            Self::Memory(series) => Ok(Cow::Borrowed(series)),
        }
    }
}

/// Why a single instrument contributed nothing.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentFailure {
    pub symbol: String,
    pub reason: String,
}

/// One instrument's successful contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub symbol: String,
    pub bars: usize,
    pub candidates: usize,
    pub series_hash: String,
}

/// The merged pool plus per-instrument provenance.
#[derive(Debug)]
pub struct PoolBuild {
    pub pool: CandidatePool,
    pub contributions: Vec<Contribution>,
    pub failures: Vec<InstrumentFailure>,
    /// BLAKE3 over the symbol and series hash of every contributing instrument.
    pub dataset_hash: String,
}

struct TaskOutput {
    contribution: Contribution,
    candidates: Vec<gridlab_core::domain::Candidate>,
}

fn run_task(source: &InstrumentSource, plan: &EnginePlan) -> Result<TaskOutput, TaskError> {
    let series = match plan.frequency {
        Frequency::Daily => source.load()?,
        Frequency::Weekly => Cow::Owned(source.load()?.to_weekly()),
    };
    let candidates = build_candidates(
        &series.bars,
        &plan.indicators,
        &plan.predicate,
        &plan.layout,
    )?;
    debug!(
        symbol = %series.symbol,
        bars = series.len(),
        candidates = candidates.len(),
        "Instrument processed"
    );
    Ok(TaskOutput {
        contribution: Contribution {
            symbol: series.symbol.clone(),
            bars: series.len(),
            candidates: candidates.len(),
            series_hash: series_hash(&series),
        },
        candidates,
    })
}

/// Build the candidate pool across all instruments on a fixed-size pool of
/// `workers` threads (0 uses every available core).
///
/// Symbols must be unique; the merge order is keyed on them.
pub fn build_pool(
    sources: &[InstrumentSource],
    plan: &EnginePlan,
    workers: usize,
) -> Result<PoolBuild, SweepError> {
    let mut ordered: Vec<(String, &InstrumentSource)> =
        sources.iter().map(|s| (s.symbol(), s)).collect();
    ordered.sort_by(|a, b| a.0.cmp(&b.0));
    if let Some(pair) = ordered.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(SweepError::DuplicateSymbol(pair[0].0.clone()));
    }

    let threads = ThreadPoolBuilder::new().num_threads(workers).build()?;
    info!(
        instruments = ordered.len(),
        workers = threads.current_num_threads(),
        "Building candidate pool"
    );

    let outputs: Vec<(String, Result<TaskOutput, TaskError>)> = threads.install(|| {
        ordered
            .par_iter()
            .map(|(symbol, source)| (symbol.clone(), run_task(source, plan)))
            .collect()
    });

    let mut pool = CandidatePool::new(plan.layout.clone());
    let mut contributions = Vec::new();
    let mut failures = Vec::new();
    let mut hasher = blake3::Hasher::new();

    for (symbol, output) in outputs {
        match output {
            Ok(TaskOutput {
                contribution,
                candidates,
            }) => {
                hasher.update(contribution.symbol.as_bytes());
                hasher.update(contribution.series_hash.as_bytes());
                pool.extend(candidates);
                contributions.push(contribution);
            }
            Err(error) => {
                warn!(%symbol, %error, "Instrument skipped");
                failures.push(InstrumentFailure {
                    symbol,
                    reason: error.to_string(),
                });
            }
        }
    }

    info!(
        candidates = pool.len(),
        contributing = contributions.len(),
        failed = failures.len(),
        "Candidate pool built"
    );

    Ok(PoolBuild {
        pool,
        contributions,
        failures,
        dataset_hash: hasher.finalize().to_hex().to_string(),
    })
}
