//! Serializable sweep configuration.
//!
//! A TOML file describes the whole run: engine settings, the indicator set,
//! the admission conditions and the parameter grid. [`SweepConfig::plan`]
//! validates it into an [`EnginePlan`] of runtime objects.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gridlab_core::admission::{Comparison, Condition, ConditionSet, Operand};
use gridlab_core::domain::Bar;
use gridlab_core::grid::{
    Bound, EntryDimension, GridError, MomentumExit, ParameterGrid, ReversalExit,
};
use gridlab_core::indicators::{
    Bollinger, BollingerBand, Ema, Indicator, MaDeviation, Macd, MacdLine, Named, Rsi, Sma,
    Stochastic, StochasticLine, VolumeRatio,
};
use gridlab_core::pool::PoolLayout;

use crate::fitness::RankingMetric;

/// Unique identifier for a sweep run (content-addressable hash).
pub type RunId = String;

/// Minimum trades for a combination to be reported.
pub const DEFAULT_MIN_TRADES: usize = 500;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("{context} references unknown series '{name}'")]
    UnknownSeries { name: String, context: String },

    #[error("indicator name '{0}' shadows a bar field")]
    ShadowsBarField(String),

    #[error("indicator '{name}': {reason}")]
    InvalidIndicator { name: String, reason: String },

    #[error("engine.{field}: {reason}")]
    InvalidEngine { field: &'static str, reason: String },

    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Top-level sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub data: DataConfig,

    /// Indicators keyed by the name conditions and grid dimensions use.
    #[serde(default)]
    pub indicators: BTreeMap<String, IndicatorSpec>,

    /// Conjunction of admission conditions.
    #[serde(default)]
    pub admission: Vec<Condition>,

    pub grid: ParameterGrid,
}

/// Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Forward window length captured per candidate. Defaults to the longest
    /// `hold_days`; an explicit value must equal it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizon: Option<usize>,

    /// Minimum trades for a combination to be reported.
    pub min_trades: usize,

    /// Worker threads; 0 uses every available core.
    pub workers: usize,

    /// Combinations evaluated per parallel batch.
    pub batch_size: usize,

    /// Number of ranked results to keep.
    pub top_k: usize,

    pub ranking: RankingMetric,

    pub output_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizon: None,
            min_trades: DEFAULT_MIN_TRADES,
            workers: 0,
            batch_size: 256,
            top_k: 100,
            ranking: RankingMetric::WinRate,
            output_dir: PathBuf::from("results"),
        }
    }
}

/// Bar frequency the engine runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Daily,
    /// Daily bars aggregated into Monday-to-Sunday weeks after loading.
    Weekly,
}

/// Input data settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    pub frequency: Frequency,
}

/// Indicator configuration (serializable enum).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndicatorSpec {
    Sma { period: usize },
    Ema { period: usize },
    Rsi { period: usize },
    Stochastic {
        period: usize,
        smoothing: usize,
        line: StochasticLine,
    },
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
        line: MacdLine,
    },
    Bollinger {
        period: usize,
        multiplier: f64,
        band: BollingerBand,
    },
    MaDeviation { period: usize },
    VolumeRatio { period: usize },
}

/// Create a named indicator from its configuration.
pub fn create_indicator(
    name: &str,
    spec: &IndicatorSpec,
) -> Result<Box<dyn Indicator>, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidIndicator {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let inner: Box<dyn Indicator> = match *spec {
        IndicatorSpec::Sma { period } | IndicatorSpec::Ema { period }
        | IndicatorSpec::Rsi { period } | IndicatorSpec::MaDeviation { period }
        | IndicatorSpec::VolumeRatio { period }
            if period == 0 =>
        {
            return Err(invalid("period must be positive"));
        }
        IndicatorSpec::Sma { period } => Box::new(Sma::new(period)),
        IndicatorSpec::Ema { period } => Box::new(Ema::new(period)),
        IndicatorSpec::Rsi { period } => Box::new(Rsi::new(period)),
        IndicatorSpec::MaDeviation { period } => Box::new(MaDeviation::new(period)),
        IndicatorSpec::VolumeRatio { period } => Box::new(VolumeRatio::new(period)),
        IndicatorSpec::Stochastic {
            period,
            smoothing,
            line,
        } => {
            if period == 0 || smoothing == 0 {
                return Err(invalid("period and smoothing must be positive"));
            }
            Box::new(Stochastic::new(period, smoothing, line))
        }
        IndicatorSpec::Macd {
            fast,
            slow,
            signal,
            line,
        } => {
            if fast == 0 || signal == 0 || fast >= slow {
                return Err(invalid("require 0 < fast < slow and signal > 0"));
            }
            Box::new(Macd::new(fast, slow, signal, line))
        }
        IndicatorSpec::Bollinger {
            period,
            multiplier,
            band,
        } => {
            if period == 0 || !multiplier.is_finite() {
                return Err(invalid("period must be positive and multiplier finite"));
            }
            Box::new(Bollinger::new(period, multiplier, band))
        }
    };
    Ok(Box::new(Named::new(name, inner)))
}

/// Validated runtime objects for one sweep.
pub struct EnginePlan {
    pub indicators: Vec<Box<dyn Indicator>>,
    pub predicate: ConditionSet,
    pub layout: PoolLayout,
    pub grid: ParameterGrid,
    pub min_trades: usize,
    pub frequency: Frequency,
}

impl SweepConfig {
    /// Parse a TOML string.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Computes a deterministic hash ID for this configuration and dataset.
    ///
    /// Two runs with identical configs over identical data share a RunId.
    pub fn run_id(&self, dataset_hash: &str) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(json.as_bytes());
        hasher.update(dataset_hash.as_bytes());
        // 16 hex chars keeps directory names short
        Ok(hasher.finalize().to_hex().as_str()[..16].to_string())
    }

    /// Forward window length: the explicit `engine.horizon`, else the longest
    /// hold. Zero when `hold_days` is empty.
    pub fn horizon(&self) -> usize {
        self.engine
            .horizon
            .unwrap_or_else(|| self.grid.hold_days.iter().copied().max().unwrap_or(0))
    }

    /// Pool layout implied by the grid: entry fields become snapshot fields,
    /// exit series become window fields.
    pub fn layout(&self) -> PoolLayout {
        let mut layout = PoolLayout::new(self.horizon());
        for dim in &self.grid.entry {
            layout = layout.with_snapshot(dim.field.clone());
        }
        if let Some(reversal) = &self.grid.reversal_exit {
            layout = layout
                .with_window(reversal.fast.clone())
                .with_window(reversal.slow.clone());
        }
        if let Some(momentum) = &self.grid.momentum_exit {
            layout = layout.with_window(momentum.series.clone());
        }
        layout
    }

    /// Validate the configuration and build its runtime objects.
    pub fn plan(&self) -> Result<EnginePlan, ConfigError> {
        let Some(longest) = self.grid.hold_days.iter().copied().max() else {
            return Err(GridError::EmptyDimension("hold_days".into()).into());
        };
        if let Some(horizon) = self.engine.horizon {
            if horizon != longest {
                return Err(ConfigError::InvalidEngine {
                    field: "horizon",
                    reason: format!("{horizon} must equal the longest hold_days ({longest})"),
                });
            }
        }
        if self.engine.batch_size == 0 {
            return Err(ConfigError::InvalidEngine {
                field: "batch_size",
                reason: "must be at least 1".into(),
            });
        }

        let mut indicators = Vec::with_capacity(self.indicators.len());
        for (name, spec) in &self.indicators {
            if Bar::FIELDS.contains(&name.as_str()) {
                return Err(ConfigError::ShadowsBarField(name.clone()));
            }
            indicators.push(create_indicator(name, spec)?);
        }

        let known = |name: &str| {
            Bar::FIELDS.contains(&name) || self.indicators.contains_key(name)
        };

        for (i, condition) in self.admission.iter().enumerate() {
            for name in condition.fields() {
                if !known(name) {
                    return Err(ConfigError::UnknownSeries {
                        name: name.to_string(),
                        context: format!("admission[{i}]"),
                    });
                }
            }
        }

        let layout = self.layout();
        for name in layout.snapshot_fields.iter().chain(&layout.window_fields) {
            if !known(name) {
                return Err(ConfigError::UnknownSeries {
                    name: name.clone(),
                    context: "grid".into(),
                });
            }
        }
        self.grid.validate(&layout)?;

        Ok(EnginePlan {
            indicators,
            predicate: ConditionSet::new(self.admission.clone()),
            layout,
            grid: self.grid.clone(),
            min_trades: self.engine.min_trades,
            frequency: self.data.frequency,
        })
    }

    /// The oversold-reversal preset: deep below the 60-day average, weak
    /// short-term RSI, stochastic K above D.
    pub fn example() -> Self {
        let mut indicators = BTreeMap::new();
        indicators.insert("pot".to_string(), IndicatorSpec::MaDeviation { period: 60 });
        indicators.insert("rsi".to_string(), IndicatorSpec::Rsi { period: 6 });
        indicators.insert(
            "k".to_string(),
            IndicatorSpec::Stochastic {
                period: 9,
                smoothing: 3,
                line: StochasticLine::K,
            },
        );
        indicators.insert(
            "d".to_string(),
            IndicatorSpec::Stochastic {
                period: 9,
                smoothing: 3,
                line: StochasticLine::D,
            },
        );
        indicators.insert(
            "hist".to_string(),
            IndicatorSpec::Macd {
                fast: 12,
                slow: 26,
                signal: 9,
                line: MacdLine::Histogram,
            },
        );

        let stop_loss = (7..=18).map(|p| -(p as f64) / 100.0).collect();

        Self {
            engine: EngineConfig::default(),
            data: DataConfig::default(),
            indicators,
            admission: vec![
                Condition::new("pot", Comparison::Gt, Operand::Value(10.0)),
                Condition::new("rsi", Comparison::Lt, Operand::Value(45.0)),
                Condition::new("k", Comparison::Gt, Operand::Field("d".into())),
            ],
            grid: ParameterGrid {
                entry: vec![
                    EntryDimension {
                        field: "pot".into(),
                        bound: Bound::Min,
                        values: vec![15.0, 20.0, 25.0, 30.0, 35.0, 40.0, 45.0],
                    },
                    EntryDimension {
                        field: "rsi".into(),
                        bound: Bound::Max,
                        values: (20..=40).step_by(2).map(f64::from).collect(),
                    },
                ],
                hold_days: vec![10, 15, 20, 25, 30, 35],
                stop_loss,
                take_profit: vec![],
                breakeven_arm: vec![],
                reversal_exit: Some(ReversalExit {
                    fast: "k".into(),
                    slow: "d".into(),
                    levels: vec![70.0, 75.0, 80.0, 85.0, 90.0],
                }),
                momentum_exit: Some(MomentumExit {
                    series: "hist".into(),
                    below: 0.0,
                    enabled: vec![true],
                }),
            },
        }
    }
}
