//! Bar loading for the runner.
//!
//! Reads one instrument per CSV file. Column headers are normalized so both
//! English exports (`date,open,high,...`) and Chinese exports
//! (`日期,开盘,最高,...`) load into the same [`Bar`] fields. Optional columns
//! missing from a file are filled with NaN.
//!
//! Synthetic random-walk instruments are available for dry runs and tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use gridlab_core::domain::{Bar, InstrumentSeries};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("{path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("{path} line {line}: invalid {column} value '{value}'")]
    BadValue {
        path: PathBuf,
        line: u64,
        column: &'static str,
        value: String,
    },

    #[error("{path} contains no usable bars")]
    Empty { path: PathBuf },
}

/// Canonical column names and the header spellings accepted for each.
const COLUMN_ALIASES: [(&str, &[&str]); 8] = [
    ("date", &["date", "日期", "trade_date", "datetime"]),
    ("open", &["open", "开盘", "开盘价"]),
    ("high", &["high", "最高", "最高价"]),
    ("low", &["low", "最低", "最低价"]),
    ("close", &["close", "收盘", "收盘价"]),
    ("volume", &["volume", "vol", "成交量"]),
    ("turnover", &["turnover", "turnover_rate", "换手率"]),
    ("pct_change", &["pct_change", "pct_chg", "涨跌幅"]),
];

const REQUIRED: [&str; 5] = ["date", "open", "high", "low", "close"];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d"];

/// Map a raw header to its canonical column name.
pub fn normalize_header(raw: &str) -> Option<&'static str> {
    let cleaned = raw.trim().trim_start_matches('\u{feff}').to_ascii_lowercase();
    COLUMN_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&cleaned.as_str()))
        .map(|(canonical, _)| *canonical)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    // Timestamps like "2024-01-02 00:00:00" keep only the date part.
    let s = s.split_whitespace().next().unwrap_or(s);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim().trim_end_matches('%');
    if s.is_empty() || s == "-" || s.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    s.parse().ok()
}

/// Symbol for a CSV path: the file stem.
pub fn symbol_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load one instrument from a CSV file.
///
/// Rows failing the OHLC sanity check (suspended sessions, zero prices) are
/// dropped. Bars are returned sorted by date with duplicate dates removed.
pub fn load_csv(path: &Path) -> Result<InstrumentSeries, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut series = parse_csv(&text, path)?;
    series.symbol = symbol_for(path);
    Ok(series)
}

/// Parse CSV text. `path` is used for error messages only.
pub fn parse_csv(text: &str, path: &Path) -> Result<InstrumentSeries, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = rdr.headers().map_err(csv_err)?.clone();
    let mut columns: HashMap<&'static str, usize> = HashMap::new();
    for (i, raw) in headers.iter().enumerate() {
        if let Some(canonical) = normalize_header(raw) {
            columns.entry(canonical).or_insert(i);
        }
    }
    for column in REQUIRED {
        if !columns.contains_key(column) {
            return Err(LoadError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }

    let mut bars = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map_or(0, |p| p.line());
        let cell = |column: &'static str| columns.get(column).and_then(|&i| record.get(i));

        let bad = |column: &'static str, value: &str| LoadError::BadValue {
            path: path.to_path_buf(),
            line,
            column,
            value: value.to_string(),
        };

        let raw_date = cell("date").unwrap_or("");
        let date = parse_date(raw_date).ok_or_else(|| bad("date", raw_date))?;

        let number = |column: &'static str| -> Result<f64, LoadError> {
            match cell(column) {
                None => Ok(f64::NAN),
                Some(raw) => parse_number(raw).ok_or_else(|| bad(column, raw)),
            }
        };

        let bar = Bar {
            date,
            open: number("open")?,
            high: number("high")?,
            low: number("low")?,
            close: number("close")?,
            volume: number("volume")?,
            turnover: number("turnover")?,
            pct_change: number("pct_change")?,
        };
        if bar.is_sane() {
            bars.push(bar);
        }
    }

    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);

    if bars.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }

    Ok(InstrumentSeries::new(symbol_for(path), bars))
}

/// List the CSV files in `dir`, sorted by file name.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Compute a deterministic BLAKE3 hash over one instrument's bars.
pub fn series_hash(series: &InstrumentSeries) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(series.symbol.as_bytes());
    for bar in &series.bars {
        hasher.update(bar.date.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
        hasher.update(&bar.turnover.to_le_bytes());
        hasher.update(&bar.pct_change.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Generate synthetic bars for testing/development.
///
/// Produces a random walk from a starting price of 20.0 over `days` weekdays.
/// The seed is derived from the symbol, so the same symbol always yields the
/// same series.
pub fn generate_synthetic_bars(symbol: &str, start: NaiveDate, days: usize) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    // Deterministic seed from symbol name
    let seed_bytes = blake3::hash(symbol.as_bytes());
    let seed: [u8; 32] = *seed_bytes.as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::with_capacity(days);
    let mut price = 20.0_f64;
    let mut current = start;

    while bars.len() < days {
        // Skip weekends (simple heuristic)
        let weekday = current.weekday();
        if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.04..0.04);
        let open = price;
        let close = (price * (1.0 + daily_return)).max(0.5);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.015));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.015));

        bars.push(Bar {
            date: current,
            open,
            high,
            low,
            close,
            volume: rng.gen_range(100_000.0..5_000_000.0),
            turnover: rng.gen_range(0.5..15.0),
            pct_change: (close - open) / open * 100.0,
        });

        price = close;
        current += chrono::Duration::days(1);
    }

    bars
}

/// `count` synthetic instruments named `SYN0000`, `SYN0001`, ...
pub fn synthetic_universe(count: usize, start: NaiveDate, days: usize) -> Vec<InstrumentSeries> {
    (0..count)
        .map(|i| {
            let symbol = format!("SYN{i:04}");
            let bars = generate_synthetic_bars(&symbol, start, days);
            InstrumentSeries::new(symbol, bars)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p() -> PathBuf {
        PathBuf::from("test.csv")
    }

    #[test]
    fn english_headers() {
        let text = "date,open,high,low,close,volume\n\
                    2024-01-03,10.1,10.6,10.0,10.5,1200\n\
                    2024-01-02,10.0,10.2,9.8,10.1,1000\n";
        let series = parse_csv(text, &p()).unwrap();
        assert_eq!(series.symbol, "test");
        assert_eq!(series.len(), 2);
        assert!(series.is_ordered(), "rows are sorted by date");
        assert_eq!(series.bars[0].close, 10.1);
        assert_eq!(series.bars[1].volume, 1200.0);
        assert!(series.bars[0].turnover.is_nan(), "absent column is NaN");
    }

    #[test]
    fn chinese_headers_with_bom() {
        let text = "\u{feff}日期,开盘,收盘,最高,最低,成交量,成交额,换手率,涨跌幅\n\
                    2024-01-02,10.0,10.1,10.2,9.8,1000,10100,3.5,1.0\n";
        let series = parse_csv(text, &p()).unwrap();
        let bar = &series.bars[0];
        assert_eq!(bar.close, 10.1);
        assert_eq!(bar.high, 10.2);
        assert_eq!(bar.turnover, 3.5);
        assert_eq!(bar.pct_change, 1.0);
    }

    #[test]
    fn compact_dates_and_percent_cells() {
        let text = "trade_date,open,high,low,close,pct_chg\n20240102,10,11,9,10.5,5%\n";
        let series = parse_csv(text, &p()).unwrap();
        assert_eq!(series.bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(series.bars[0].pct_change, 5.0);
    }

    #[test]
    fn missing_required_column() {
        let text = "date,open,high,close\n2024-01-02,10,11,10.5\n";
        let err = parse_csv(text, &p()).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { column: "low", .. }));
    }

    #[test]
    fn bad_number_reports_line() {
        let text = "date,open,high,low,close\n2024-01-02,10,11,9,10.5\n2024-01-03,10,abc,9,10\n";
        let err = parse_csv(text, &p()).unwrap_err();
        assert!(matches!(err, LoadError::BadValue { column: "high", line: 3, .. }));
    }

    #[test]
    fn insane_rows_are_dropped() {
        let text = "date,open,high,low,close\n\
                    2024-01-02,0,0,0,0\n\
                    2024-01-03,10,11,9,10.5\n\
                    2024-01-03,10,11,9,10.7\n";
        let series = parse_csv(text, &p()).unwrap();
        assert_eq!(series.len(), 1, "zero prices dropped, duplicate date removed");
        assert_eq!(series.bars[0].close, 10.5);
    }

    #[test]
    fn empty_file_is_an_error() {
        let err = parse_csv("date,open,high,low,close\n", &p()).unwrap_err();
        assert!(matches!(err, LoadError::Empty { .. }));
    }

    #[test]
    fn header_normalization() {
        assert_eq!(normalize_header(" Close "), Some("close"));
        assert_eq!(normalize_header("收盘"), Some("close"));
        assert_eq!(normalize_header("成交额"), None);
    }

    #[test]
    fn synthetic_data_is_deterministic() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let a = generate_synthetic_bars("SYN0001", start, 300);
        let b = generate_synthetic_bars("SYN0001", start, 300);
        assert_eq!(a, b);
        assert_eq!(a.len(), 300);
        assert!(a.iter().all(Bar::is_sane));
        assert!(a.iter().all(|b| b.date.weekday().number_from_monday() <= 5));
    }

    #[test]
    fn different_symbols_get_different_synthetic_data() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let a = generate_synthetic_bars("SYN0001", start, 50);
        let b = generate_synthetic_bars("SYN0002", start, 50);
        assert_ne!(a, b);
    }

    #[test]
    fn series_hash_is_deterministic() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let universe = synthetic_universe(2, start, 30);
        assert_eq!(series_hash(&universe[0]), series_hash(&universe[0].clone()));
        assert_ne!(series_hash(&universe[0]), series_hash(&universe[1]));
    }
}
