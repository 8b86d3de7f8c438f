//! Bar: one trading session for one instrument.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar.
///
/// `turnover` (percent of float traded) and `pct_change` (session change in
/// percent) are optional in most sources; loaders fill them with NaN when the
/// column is absent. Nothing in the engine reads a NaN as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub turnover: f64,
    pub pct_change: f64,
}

impl Bar {
    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, low <= open/close, positive prices.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// Look up a raw bar field by name. Returns `None` for unknown names.
    pub fn field(&self, name: &str) -> Option<f64> {
        match name {
            "open" => Some(self.open),
            "high" => Some(self.high),
            "low" => Some(self.low),
            "close" => Some(self.close),
            "volume" => Some(self.volume),
            "turnover" => Some(self.turnover),
            "pct_change" => Some(self.pct_change),
            _ => None,
        }
    }

    /// Names accepted by [`Bar::field`].
    pub const FIELDS: [&'static str; 7] = [
        "open",
        "high",
        "low",
        "close",
        "volume",
        "turnover",
        "pct_change",
    ];
}

/// One instrument's ordered bar history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentSeries {
    pub symbol: String,
    pub bars: Vec<Bar>,
}

impl InstrumentSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// True if dates are strictly increasing.
    pub fn is_ordered(&self) -> bool {
        self.bars.windows(2).all(|w| w[0].date < w[1].date)
    }

    /// Aggregate daily bars into Monday-to-Sunday weeks.
    ///
    /// Open is the week's first open, close its last close, high/low the
    /// extremes, volume and turnover the sums. Each weekly bar is dated on its
    /// last session. `pct_change` is recomputed from consecutive weekly closes
    /// and is NaN for the first week. Bars must be ordered.
    pub fn to_weekly(&self) -> InstrumentSeries {
        let mut weeks: Vec<Bar> = Vec::new();
        let mut current: Option<((i32, u32), Bar)> = None;

        for bar in &self.bars {
            let week = bar.date.iso_week();
            let key = (week.year(), week.week());
            current = match current.take() {
                Some((k, mut agg)) if k == key => {
                    agg.date = bar.date;
                    agg.high = agg.high.max(bar.high);
                    agg.low = agg.low.min(bar.low);
                    agg.close = bar.close;
                    agg.volume = nan_sum(agg.volume, bar.volume);
                    agg.turnover = nan_sum(agg.turnover, bar.turnover);
                    Some((k, agg))
                }
                finished => {
                    if let Some((_, agg)) = finished {
                        weeks.push(agg);
                    }
                    Some((key, bar.clone()))
                }
            };
        }
        if let Some((_, agg)) = current {
            weeks.push(agg);
        }

        let mut prev_close = f64::NAN;
        for week in &mut weeks {
            week.pct_change = (week.close / prev_close - 1.0) * 100.0;
            prev_close = week.close;
        }

        InstrumentSeries::new(self.symbol.clone(), weeks)
    }
}

/// Sum that skips a missing side; NaN only when both are missing.
fn nan_sum(a: f64, b: f64) -> f64 {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => f64::NAN,
        (true, false) => b,
        (false, true) => a,
        (false, false) => a + b,
    }
}
