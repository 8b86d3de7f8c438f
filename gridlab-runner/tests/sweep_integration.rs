//! End-to-end sweep over CSV files on disk.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use gridlab_runner::export::{export_results_csv, generate_report};
use gridlab_runner::{
    list_csv_files, load_artifacts, replay, run_sweep, save_artifacts, InstrumentSource,
    SweepConfig, SweepError,
};

const CONFIG: &str = r#"
[engine]
horizon = 5
min_trades = 1
workers = 2
batch_size = 3
top_k = 10

[indicators.rsi]
type = "rsi"
period = 3

[grid]
hold_days = [3, 5]
stop_loss = [-0.05]

[[grid.entry]]
field = "rsi"
bound = "max"
values = [50, 100]
"#;

fn closes(n: usize, phase: f64) -> Vec<f64> {
    (0..n)
        .map(|i| 10.0 + (i as f64 * 0.7 + phase).sin())
        .collect()
}

fn write_csv(path: &Path, header: &str, closes: &[f64]) {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let mut text = format!("{header}\n");
    for (i, c) in closes.iter().enumerate() {
        let date = start + Duration::days(i as i64);
        writeln!(
            text,
            "{},{c:.4},{:.4},{:.4},{c:.4},1000",
            date.format("%Y-%m-%d"),
            c + 0.1,
            c - 0.1
        )
        .unwrap();
    }
    std::fs::write(path, text).unwrap();
}

fn universe(dir: &Path) -> Vec<InstrumentSource> {
    write_csv(
        &dir.join("AAA.csv"),
        "date,open,high,low,close,volume",
        &closes(120, 0.0),
    );
    write_csv(
        &dir.join("BBB.csv"),
        "日期,开盘,最高,最低,收盘,成交量",
        &closes(90, 1.3),
    );
    std::fs::write(dir.join("BROKEN.csv"), "date,open,high,low\n2020-01-01,1,1,1\n").unwrap();
    list_csv_files(dir)
        .unwrap()
        .into_iter()
        .map(InstrumentSource::Csv)
        .collect()
}

fn created() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
}

#[test]
fn sweep_over_csv_directory() {
    let data = tempfile::tempdir().unwrap();
    let sources = universe(data.path());
    let config = SweepConfig::from_toml(CONFIG).unwrap();

    let report = run_sweep(&config, &sources, created()).unwrap();

    assert_eq!(report.combinations, 4);
    assert_eq!(report.contributions.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].symbol, "BROKEN");
    assert!(report.failures[0].reason.contains("close"));

    let total: usize = report.contributions.iter().map(|c| c.candidates).sum();
    assert_eq!(total, report.candidates);
    assert!(report.candidates > 0);

    assert!(!report.ranked.is_empty());
    assert!(report.ranked.len() <= 4);
    assert!(report.empty_message().is_none());
    for pair in report.ranked.windows(2) {
        assert!(pair[0].stats.win_rate >= pair[1].stats.win_rate);
    }
}

#[test]
fn run_id_is_stable_across_runs() {
    let data = tempfile::tempdir().unwrap();
    let sources = universe(data.path());
    let config = SweepConfig::from_toml(CONFIG).unwrap();

    let a = run_sweep(&config, &sources, created()).unwrap();
    let b = run_sweep(&config, &sources, created()).unwrap();
    assert_eq!(a.run_id, b.run_id);
    assert_eq!(a.ranked, b.ranked);

    let mut other = config.clone();
    other.engine.min_trades = 2;
    let c = run_sweep(&other, &sources, created()).unwrap();
    assert_ne!(a.run_id, c.run_id);
}

#[test]
fn unreachable_floor_reports_message() {
    let data = tempfile::tempdir().unwrap();
    let sources = universe(data.path());
    let mut config = SweepConfig::from_toml(CONFIG).unwrap();
    config.engine.min_trades = 1_000_000;

    let report = run_sweep(&config, &sources, created()).unwrap();
    assert!(report.ranked.is_empty());
    assert_eq!(report.qualifying, 0);
    let message = report.empty_message().unwrap();
    assert!(message.contains("1000000"));
    assert!(generate_report(&report).contains(&message));
}

#[test]
fn artifacts_are_written_and_reloaded() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let sources = universe(data.path());
    let config = SweepConfig::from_toml(CONFIG).unwrap();
    let report = run_sweep(&config, &sources, created()).unwrap();

    let dir = save_artifacts(&report, out.path()).unwrap();
    assert_eq!(dir, out.path().join(&report.run_id));
    for file in ["manifest.json", "results.csv", "results.md"] {
        assert!(dir.join(file).is_file(), "missing {file}");
    }

    let csv = std::fs::read_to_string(dir.join("results.csv")).unwrap();
    assert_eq!(csv, export_results_csv(&report).unwrap());
    assert_eq!(csv.lines().count(), report.ranked.len() + 1);

    let loaded = load_artifacts(&dir).unwrap();
    assert_eq!(loaded.run_id, report.run_id);
    assert_eq!(loaded.ranked, report.ranked);
    assert_eq!(loaded.failures, report.failures);
}

#[test]
fn replay_matches_ranked_result() {
    let data = tempfile::tempdir().unwrap();
    let sources = universe(data.path());
    let config = SweepConfig::from_toml(CONFIG).unwrap();
    let report = run_sweep(&config, &sources, created()).unwrap();
    let best = &report.ranked[0];

    let replayed = replay(&config, &sources, best.index).unwrap();
    assert_eq!(replayed.combination, best.combination);
    assert_eq!(replayed.outcomes.len(), best.stats.count);
    let wins = replayed
        .outcomes
        .iter()
        .filter(|o| o.return_pct > 0.0)
        .count();
    assert_eq!(wins, best.stats.wins);
}

#[test]
fn replay_rejects_index_outside_grid() {
    let data = tempfile::tempdir().unwrap();
    let sources = universe(data.path());
    let config = SweepConfig::from_toml(CONFIG).unwrap();

    let err = replay(&config, &sources, 4).err().unwrap();
    assert!(matches!(
        err,
        SweepError::NoSuchCombination { index: 4, size: 4 }
    ));
}
