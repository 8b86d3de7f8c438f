//! Ranking metric: configurable selector for ordering combination results.

use gridlab_core::grid::TradeStats;
use serde::{Deserialize, Serialize};

/// Which statistic to rank combinations by. Higher is always better.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMetric {
    #[default]
    WinRate,
    MeanReturn,
    ProfitFactor,
    Count,
}

impl RankingMetric {
    pub const ALL: [RankingMetric; 4] = [
        RankingMetric::WinRate,
        RankingMetric::MeanReturn,
        RankingMetric::ProfitFactor,
        RankingMetric::Count,
    ];

    /// Extract the relevant value from a TradeStats struct.
    pub fn extract(&self, stats: &TradeStats) -> f64 {
        match self {
            Self::WinRate => stats.win_rate,
            Self::MeanReturn => stats.mean_return,
            Self::ProfitFactor => stats.profit_factor,
            Self::Count => stats.count as f64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WinRate => "win_rate",
            Self::MeanReturn => "mean_return",
            Self::ProfitFactor => "profit_factor",
            Self::Count => "count",
        }
    }
}

impl std::str::FromStr for RankingMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
                format!("unknown ranking metric '{s}' (expected one of: {})", known.join(", "))
            })
    }
}
