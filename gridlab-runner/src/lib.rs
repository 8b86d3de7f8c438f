//! GridLab Runner: sweep orchestration, data loading, ranking, reporting.
//!
//! This crate builds on `gridlab-core` to provide:
//! - TOML sweep configuration validated into an engine plan
//! - CSV loading with header normalization, plus synthetic series
//! - Parallel per-instrument pool building with isolated failures
//! - Batched grid evaluation and leaderboard ranking
//! - Yearly breakdowns and CSV/Markdown/JSON artifacts

pub mod breakdown;
pub mod config;
pub mod coordinator;
pub mod data_loader;
pub mod export;
pub mod fitness;
pub mod leaderboard;
pub mod sweep;

pub use breakdown::{yearly_breakdown, YearRow};
pub use config::{
    create_indicator, ConfigError, DataConfig, EngineConfig, EnginePlan, Frequency, IndicatorSpec,
    RunId, SweepConfig, DEFAULT_MIN_TRADES,
};
pub use coordinator::{
    build_pool, Contribution, InstrumentFailure, InstrumentSource, PoolBuild, TaskError,
};
pub use data_loader::{
    generate_synthetic_bars, list_csv_files, load_csv, synthetic_universe, LoadError,
};
pub use export::{load_artifacts, save_artifacts};
pub use fitness::RankingMetric;
pub use leaderboard::rank;
pub use sweep::{evaluate_batched, replay, run_sweep, Replay, SweepError, SweepReport};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<SweepConfig>();
        assert_sync::<SweepConfig>();
        assert_send::<EnginePlan>();
        assert_sync::<EnginePlan>();
    }

    #[test]
    fn instrument_source_is_send_sync() {
        assert_send::<InstrumentSource>();
        assert_sync::<InstrumentSource>();
    }

    #[test]
    fn pool_build_is_send_sync() {
        assert_send::<PoolBuild>();
        assert_sync::<PoolBuild>();
    }

    #[test]
    fn sweep_report_is_send_sync() {
        assert_send::<SweepReport>();
        assert_sync::<SweepReport>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<SweepError>();
        assert_sync::<SweepError>();
        assert_send::<LoadError>();
        assert_sync::<LoadError>();
    }
}
