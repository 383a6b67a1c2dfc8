//! neural_debug - run forecasting debug scenarios
//!
//! ```text
//! neural_debug trend --data example_wp_log_peyton_manning.csv --verbose
//! neural_debug all --epochs 20 --plot-dir plots
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use neural_owl::harness::{synthetic_series, Harness, HarnessOptions, Scenario, ScenarioOutcome};
use neural_owl::neural_forecast::DataLoader;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "neural_debug")]
#[command(about = "Fit, predict and inspect forecasting models on a ds/y CSV")]
#[command(version)]
struct Cli {
    /// Scenario to run
    #[arg(value_enum, default_value = "all")]
    scenario: Scenario,

    /// CSV with `ds` and `y` columns; a synthetic daily series is used when omitted
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Print metrics and fitted coefficients
    #[arg(short, long)]
    verbose: bool,

    /// Write figures as JSON and forecasts as CSV into this directory
    #[arg(long)]
    plot_dir: Option<PathBuf>,

    /// Number of training epochs; chosen from the data size when omitted
    #[arg(long)]
    epochs: Option<usize>,

    /// Length of the synthetic series in days
    #[arg(long, default_value = "2900")]
    synthetic_days: usize,

    /// Seed of the synthetic series
    #[arg(long, default_value = "0")]
    seed: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let data = match &cli.data {
        Some(path) => DataLoader::from_csv(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => synthetic_series(cli.synthetic_days, cli.seed)?,
    };
    info!(rows = data.len(), "loaded data");

    let mut options = HarnessOptions::default()
        .with_verbose(cli.verbose)
        .with_plots(cli.plot_dir.is_some());
    if let Some(epochs) = cli.epochs {
        options = options.with_epochs(epochs);
    }
    let harness = Harness::new(data, options);

    if let Some(dir) = &cli.plot_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    for scenario in cli.scenario.expand() {
        let outcome = harness
            .run(scenario)
            .with_context(|| format!("scenario '{}' failed", scenario))?;
        println!("{} ... ok", scenario);
        if cli.verbose {
            print_outcome(&outcome);
        }
        if let Some(dir) = &cli.plot_dir {
            write_outcome(dir, &outcome)?;
        }
    }
    Ok(())
}

fn print_outcome(outcome: &ScenarioOutcome) {
    for (label, table) in &outcome.metrics {
        println!("Metrics: {}", label);
        println!("{}", table);
    }
    for note in &outcome.notes {
        println!("{}", note);
    }
    if let Some(forecast) = &outcome.forecast {
        println!(
            "Forecast: {} rows, components: {}",
            forecast.len(),
            forecast.component_names().join(", ")
        );
    }
}

fn write_outcome(dir: &Path, outcome: &ScenarioOutcome) -> Result<()> {
    let prefix = outcome.scenario.to_string();
    if let Some(forecast) = &outcome.forecast {
        let path = dir.join(format!("{}_forecast.csv", prefix));
        forecast
            .write_csv(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    for (i, figure) in outcome.figures.iter().enumerate() {
        let path = dir.join(format!("{}_{:02}.json", prefix, i));
        figure
            .write_json(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    info!(scenario = %prefix, figures = outcome.figures.len(), "wrote plots");
    Ok(())
}
