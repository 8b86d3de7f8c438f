//! GridLab CLI: parameter sweeps, combination replays, config scaffolding.
//!
//! Commands:
//! - `sweep`: build the candidate pool and evaluate the whole grid
//! - `replay`: re-run one combination and print its yearly breakdown
//! - `example-config`: print the built-in reversal preset as TOML

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use gridlab_runner::export::{breakdown_markdown, format_table};
use gridlab_runner::{
    list_csv_files, replay, run_sweep, save_artifacts, synthetic_universe, yearly_breakdown,
    InstrumentSource, RankingMetric, SweepConfig,
};

#[derive(Parser)]
#[command(
    name = "gridlab",
    about = "GridLab CLI: candidate-pool grid search over daily bars"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every parameter combination and save ranked results.
    Sweep {
        #[command(flatten)]
        input: InputArgs,

        /// Worker threads (0 = all cores). Overrides the config.
        #[arg(long)]
        workers: Option<usize>,

        /// Number of ranked results to keep. Overrides the config.
        #[arg(long)]
        top: Option<usize>,

        /// Ranking metric: win_rate, mean_return, profit_factor, count.
        #[arg(long)]
        ranking: Option<RankingMetric>,

        /// Minimum trades per combination. Overrides the config.
        #[arg(long)]
        min_trades: Option<usize>,

        /// Output directory. Overrides the config.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Rows of the ranked table printed to stdout.
        #[arg(long, default_value_t = 20)]
        show: usize,
    },
    /// Replay one combination by grid index and print its trades by year.
    Replay {
        #[command(flatten)]
        input: InputArgs,

        /// Combination index within the grid.
        #[arg(long)]
        index: usize,
    },
    /// Print the built-in example configuration.
    ExampleConfig,
}

#[derive(Args)]
struct InputArgs {
    /// Path to a TOML config file. Defaults to the built-in example.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of per-instrument CSV files.
    #[arg(long, conflicts_with = "synthetic")]
    data: Option<PathBuf>,

    /// Use this many synthetic random-walk instruments instead of CSV data.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Trading days per synthetic instrument.
    #[arg(long, default_value_t = 1500)]
    synthetic_days: usize,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sweep {
            input,
            workers,
            top,
            ranking,
            min_trades,
            output_dir,
            show,
        } => {
            let mut config = load_config(input.config.as_deref())?;
            if let Some(workers) = workers {
                config.engine.workers = workers;
            }
            if let Some(top) = top {
                config.engine.top_k = top;
            }
            if let Some(ranking) = ranking {
                config.engine.ranking = ranking;
            }
            if let Some(min_trades) = min_trades {
                config.engine.min_trades = min_trades;
            }
            if let Some(dir) = output_dir {
                config.engine.output_dir = dir;
            }
            run_sweep_cmd(&config, &input, show)
        }
        Commands::Replay { input, index } => {
            let config = load_config(input.config.as_deref())?;
            run_replay_cmd(&config, &input, index)
        }
        Commands::ExampleConfig => {
            print!("{}", SweepConfig::example().to_toml()?);
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<SweepConfig> {
    match path {
        Some(path) => SweepConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(SweepConfig::example()),
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn sources(input: &InputArgs) -> Result<Vec<InstrumentSource>> {
    match (&input.data, input.synthetic) {
        (Some(dir), _) => {
            let files = list_csv_files(dir)?;
            if files.is_empty() {
                bail!("no CSV files found in {}", dir.display());
            }
            info!(files = files.len(), dir = %dir.display(), "Using CSV data");
            Ok(files.into_iter().map(InstrumentSource::Csv).collect())
        }
        (None, Some(count)) => {
            let start = NaiveDate::from_ymd_opt(2015, 1, 5).context("invalid synthetic start")?;
            info!(count, days = input.synthetic_days, "Using synthetic data");
            Ok(synthetic_universe(count, start, input.synthetic_days)
                .into_iter()
                .map(InstrumentSource::Memory)
                .collect())
        }
        (None, None) => bail!("one of --data or --synthetic is required"),
    }
}

fn run_sweep_cmd(config: &SweepConfig, input: &InputArgs, show: usize) -> Result<()> {
    let sources = sources(input)?;
    let report = run_sweep(config, &sources, today())?;

    println!();
    println!("=== Sweep {} ===", report.run_id);
    println!(
        "Instruments:    {} ({} skipped)",
        report.contributions.len(),
        report.failures.len()
    );
    println!("Candidates:     {}", report.candidates);
    println!("Combinations:   {}", report.combinations);
    println!(
        "Qualifying:     {} (>= {} trades)",
        report.qualifying, config.engine.min_trades
    );
    println!();

    match report.empty_message() {
        Some(message) => println!("{message}"),
        None => print!("{}", format_table(&report, show)),
    }

    let run_dir = save_artifacts(&report, &config.engine.output_dir)?;
    println!();
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_replay_cmd(config: &SweepConfig, input: &InputArgs, index: usize) -> Result<()> {
    let sources = sources(input)?;
    let replayed = replay(config, &sources, index)?;
    let c = &replayed.combination;

    println!();
    println!("=== Combination {} ===", replayed.index);
    for (label, value) in config.grid.entry_labels().iter().zip(&c.entry) {
        println!("{label:<16}{value}");
    }
    println!("{:<16}{}", "hold_days", c.hold_days);
    if let Some(stop) = c.stop_loss {
        println!("{:<16}{stop}", "stop_loss");
    }
    if let Some(target) = c.take_profit {
        println!("{:<16}{target}", "take_profit");
    }
    if let Some(arm) = c.breakeven_arm {
        println!("{:<16}{arm}", "breakeven_arm");
    }
    if let Some(level) = c.reversal_level {
        println!("{:<16}{level}", "reversal_level");
    }
    println!("{:<16}{}", "momentum_exit", c.momentum_exit);
    println!();

    if replayed.outcomes.is_empty() {
        println!("No trades.");
    } else {
        print!("{}", breakdown_markdown(&yearly_breakdown(&replayed.outcomes)));
    }
    Ok(())
}
