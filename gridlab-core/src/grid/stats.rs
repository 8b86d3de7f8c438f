//! Per-combination trade statistics.

use serde::{Deserialize, Serialize};

use crate::domain::TradeOutcome;

/// Summary of a set of realized trade returns.
///
/// `profit_factor` is gross gains over gross losses and `payoff_ratio` is mean
/// win over mean loss. Both are `f64::INFINITY` when there are gains but no
/// losses, and 0 when there are no gains. `mean_max_excursion` is the
/// average best high over the holding period; it is only measured when the
/// stats are built from outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub count: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub mean_return: f64,
    pub median_return: f64,
    #[serde(with = "unbounded")]
    pub profit_factor: f64,
    #[serde(with = "unbounded")]
    pub payoff_ratio: f64,
    pub best: f64,
    pub worst: f64,
    #[serde(default)]
    pub mean_max_excursion: f64,
}

impl TradeStats {
    pub fn from_returns(returns: &[f64]) -> Self {
        let count = returns.len();
        if count == 0 {
            return Self {
                count: 0,
                wins: 0,
                win_rate: 0.0,
                mean_return: 0.0,
                median_return: 0.0,
                profit_factor: 0.0,
                payoff_ratio: 0.0,
                best: 0.0,
                worst: 0.0,
                mean_max_excursion: 0.0,
            };
        }

        let wins = returns.iter().filter(|&&r| r > 0.0).count();
        let losses = returns.iter().filter(|&&r| r < 0.0).count();
        let gross_gain: f64 = returns.iter().filter(|&&r| r > 0.0).sum();
        let gross_loss: f64 = -returns.iter().filter(|&&r| r < 0.0).sum::<f64>();

        let mut sorted = returns.to_vec();
        sorted.sort_by(f64::total_cmp);
        let median_return = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };

        let profit_factor = ratio(gross_gain, gross_loss);
        let payoff_ratio = if wins == 0 || losses == 0 {
            ratio(gross_gain, gross_loss)
        } else {
            (gross_gain / wins as f64) / (gross_loss / losses as f64)
        };

        Self {
            count,
            wins,
            win_rate: wins as f64 / count as f64,
            mean_return: returns.iter().sum::<f64>() / count as f64,
            median_return,
            profit_factor,
            payoff_ratio,
            best: sorted[count - 1],
            worst: sorted[0],
            mean_max_excursion: 0.0,
        }
    }

    pub fn from_outcomes(outcomes: &[TradeOutcome]) -> Self {
        let returns: Vec<f64> = outcomes.iter().map(|o| o.return_pct).collect();
        let mut stats = Self::from_returns(&returns);
        if !outcomes.is_empty() {
            stats.mean_max_excursion =
                outcomes.iter().map(|o| o.max_excursion).sum::<f64>() / outcomes.len() as f64;
        }
        stats
    }
}

/// JSON has no infinity; an unbounded ratio is written as `null`.
mod unbounded {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

fn ratio(gain: f64, loss: f64) -> f64 {
    if gain <= 0.0 {
        0.0
    } else if loss <= 0.0 {
        f64::INFINITY
    } else {
        gain / loss
    }
}
