//! Artifact export for sweep reports.
//!
//! A sweep is saved under `<output_dir>/<run_id>/`:
//! - `manifest.json`: the full `SweepReport`, including the config
//! - `results.csv`: ranked combinations, one row each
//! - `results.md`: human-readable summary

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gridlab_core::domain::ExitReason;
use gridlab_core::grid::CombinationResult;

use crate::breakdown::YearRow;
use crate::sweep::SweepReport;

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `SweepReport` to pretty JSON.
pub fn export_json(report: &SweepReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize SweepReport to JSON")
}

/// Deserialize a `SweepReport` from JSON.
pub fn import_json(json: &str) -> Result<SweepReport> {
    serde_json::from_str(json).context("failed to deserialize SweepReport from JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

fn opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x}")).unwrap_or_default()
}

/// Export ranked results as CSV.
///
/// Columns: rank, index, one column per entry threshold, the exit
/// parameters, the trade statistics, then one `exit_<reason>` count per
/// exit reason in priority order.
pub fn export_results_csv(report: &SweepReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["rank".to_string(), "index".to_string()];
    header.extend(report.config.grid.entry_labels());
    header.extend(
        [
            "hold_days",
            "stop_loss",
            "take_profit",
            "breakeven_arm",
            "reversal_level",
            "momentum_exit",
            "count",
            "wins",
            "win_rate",
            "mean_return",
            "median_return",
            "profit_factor",
            "payoff_ratio",
            "best",
            "worst",
            "mean_max_excursion",
        ]
        .map(String::from),
    );
    header.extend(ExitReason::ALL.map(|reason| format!("exit_{}", reason.as_str())));
    wtr.write_record(&header)?;

    for (rank, r) in report.ranked.iter().enumerate() {
        let c = &r.combination;
        let s = &r.stats;
        let mut row = vec![(rank + 1).to_string(), r.index.to_string()];
        row.extend(c.entry.iter().map(|v| format!("{v}")));
        row.extend([
            c.hold_days.to_string(),
            opt(c.stop_loss),
            opt(c.take_profit),
            opt(c.breakeven_arm),
            opt(c.reversal_level),
            c.momentum_exit.to_string(),
            s.count.to_string(),
            s.wins.to_string(),
            format!("{:.6}", s.win_rate),
            format!("{:.6}", s.mean_return),
            format!("{:.6}", s.median_return),
            format!("{:.4}", s.profit_factor),
            format!("{:.4}", s.payoff_ratio),
            format!("{:.6}", s.best),
            format!("{:.6}", s.worst),
            format!("{:.6}", s.mean_max_excursion),
        ]);
        row.extend(ExitReason::ALL.map(|reason| r.exit_counts.get(reason).to_string()));
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a sweep. Returns the created directory.
pub fn save_artifacts(report: &SweepReport, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(&report.run_id);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(report)?)?;
    std::fs::write(run_dir.join("results.csv"), export_results_csv(report)?)?;
    std::fs::write(run_dir.join("results.md"), generate_report(report))?;

    Ok(run_dir)
}

/// Load a `SweepReport` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<SweepReport> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown reports ───────────────────────────────────────────────

fn pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

fn ratio(v: f64) -> String {
    if v.is_infinite() {
        "∞".to_string()
    } else {
        format!("{v:.2}")
    }
}

fn describe(report: &SweepReport, r: &CombinationResult) -> String {
    let c = &r.combination;
    let mut parts: Vec<String> = report
        .config
        .grid
        .entry_labels()
        .into_iter()
        .zip(&c.entry)
        .map(|(label, v)| format!("{label}={v}"))
        .collect();
    parts.push(format!("hold={}", c.hold_days));
    if let Some(stop) = c.stop_loss {
        parts.push(format!("stop={stop}"));
    }
    if let Some(target) = c.take_profit {
        parts.push(format!("target={target}"));
    }
    if let Some(arm) = c.breakeven_arm {
        parts.push(format!("breakeven@{arm}"));
    }
    if let Some(level) = c.reversal_level {
        parts.push(format!("reversal>{level}"));
    }
    if c.momentum_exit {
        parts.push("momentum".to_string());
    }
    parts.join(" ")
}

/// Generate a Markdown report for a sweep.
pub fn generate_report(report: &SweepReport) -> String {
    let mut md = String::with_capacity(4096);

    md.push_str("# Grid Sweep Report\n\n");

    // Metadata
    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run ID | {} |\n", report.run_id));
    md.push_str(&format!("| Created | {} |\n", report.created));
    md.push_str(&format!("| Dataset Hash | {} |\n", report.dataset_hash));
    md.push_str(&format!(
        "| Instruments | {} ({} skipped) |\n",
        report.contributions.len(),
        report.failures.len()
    ));
    md.push_str(&format!("| Candidates | {} |\n", report.candidates));
    md.push_str(&format!("| Combinations | {} |\n", report.combinations));
    md.push_str(&format!(
        "| Qualifying (≥ {} trades) | {} |\n",
        report.config.engine.min_trades, report.qualifying
    ));
    md.push_str(&format!("| Ranked by | {} |\n", report.ranking.as_str()));
    md.push('\n');

    // Results
    md.push_str("## Top Combinations\n\n");
    if let Some(message) = report.empty_message() {
        md.push_str(&format!("_{message}_\n\n"));
    } else {
        md.push_str(
            "| # | Parameters | Trades | Win Rate | Mean | Median | PF | MFE | Stop/TP/BE/Rev/Mom/Hor |\n",
        );
        md.push_str("| --- | --- | --- | --- | --- | --- | --- | --- | --- |\n");
        for (i, r) in report.ranked.iter().enumerate() {
            let s = &r.stats;
            let exits: Vec<String> = ExitReason::ALL
                .iter()
                .map(|&reason| r.exit_counts.get(reason).to_string())
                .collect();
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
                i + 1,
                describe(report, r),
                s.count,
                pct(s.win_rate),
                pct(s.mean_return),
                pct(s.median_return),
                ratio(s.profit_factor),
                pct(s.mean_max_excursion),
                exits.join("/"),
            ));
        }
        md.push('\n');
    }

    if !report.failures.is_empty() {
        md.push_str("## Skipped Instruments\n\n");
        for f in &report.failures {
            md.push_str(&format!("- `{}`: {}\n", f.symbol, f.reason));
        }
        md.push('\n');
    }

    md
}

/// Markdown table of a yearly breakdown.
pub fn breakdown_markdown(rows: &[YearRow]) -> String {
    let mut md = String::new();
    md.push_str("| Year | Trades | Win Rate | Mean | Profit Factor | Payoff | MFE |\n");
    md.push_str("| --- | --- | --- | --- | --- | --- | --- |\n");
    for row in rows {
        let year = row
            .year
            .map_or_else(|| "**Total**".to_string(), |y| y.to_string());
        let s = &row.stats;
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            year,
            s.count,
            pct(s.win_rate),
            pct(s.mean_return),
            ratio(s.profit_factor),
            ratio(s.payoff_ratio),
            pct(s.mean_max_excursion),
        ));
    }
    md
}

/// Fixed-width table of the top `limit` results for terminal output.
pub fn format_table(report: &SweepReport, limit: usize) -> String {
    let mut out = format!(
        "{:>4}  {:>6}  {:>8}  {:>8}  {:>6}  {}\n",
        "#", "trades", "win", "mean", "pf", "parameters"
    );
    for (i, r) in report.ranked.iter().take(limit).enumerate() {
        let s = &r.stats;
        out.push_str(&format!(
            "{:>4}  {:>6}  {:>8}  {:>8}  {:>6}  {}\n",
            i + 1,
            s.count,
            pct(s.win_rate),
            pct(s.mean_return),
            ratio(s.profit_factor),
            describe(report, r),
        ));
    }
    out
}
