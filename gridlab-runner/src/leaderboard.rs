//! Ranking of combination results.
//!
//! Pure reduction: sort by the primary metric (descending), then by sample
//! count, then mean return, then combination index. The final key makes the
//! order total, so equal statistics always rank the same way.

use std::cmp::Ordering;

use gridlab_core::grid::CombinationResult;

use crate::fitness::RankingMetric;

/// Descending comparison of two results under `metric`.
pub fn compare(metric: RankingMetric, a: &CombinationResult, b: &CombinationResult) -> Ordering {
    metric
        .extract(&b.stats)
        .total_cmp(&metric.extract(&a.stats))
        .then_with(|| b.stats.count.cmp(&a.stats.count))
        .then_with(|| b.stats.mean_return.total_cmp(&a.stats.mean_return))
        .then_with(|| a.index.cmp(&b.index))
}

/// Sort `results` best first and keep the top `top_k`.
pub fn rank(
    mut results: Vec<CombinationResult>,
    metric: RankingMetric,
    top_k: usize,
) -> Vec<CombinationResult> {
    results.sort_by(|a, b| compare(metric, a, b));
    results.truncate(top_k);
    results
}
