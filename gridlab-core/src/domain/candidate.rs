//! Candidate: one admitted entry point with its forward window.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fixed-length look-ahead of future values following an entry bar.
///
/// Stored field-major: all `horizon` values of field 0, then field 1, and so
/// on. Field order follows the pool layout's window fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardWindow {
    horizon: usize,
    values: Vec<f64>,
}

impl ForwardWindow {
    /// Build a window from per-field series, each exactly `horizon` long.
    ///
    /// Returns `None` if any series has the wrong length.
    pub fn from_series(horizon: usize, series: &[&[f64]]) -> Option<Self> {
        if series.iter().any(|s| s.len() != horizon) {
            return None;
        }
        let mut values = Vec::with_capacity(horizon * series.len());
        for s in series {
            values.extend_from_slice(s);
        }
        Some(Self { horizon, values })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Number of fields held per day.
    pub fn field_count(&self) -> usize {
        if self.horizon == 0 {
            0
        } else {
            self.values.len() / self.horizon
        }
    }

    /// The `horizon`-long series for the field at `field` in the layout.
    pub fn series(&self, field: usize) -> &[f64] {
        let start = field * self.horizon;
        &self.values[start..start + self.horizon]
    }
}

/// An admitted entry point.
///
/// `snapshot` holds the entry-bar values of the pool layout's snapshot fields,
/// in layout order. Instrument identity is not retained: only aggregate
/// statistics matter downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub snapshot: Vec<f64>,
    pub window: ForwardWindow,
}
