//! Grid simulation CLI command.
//!
//! One invocation runs one seed over every (subjects x duration) cell and
//! writes `isc-{loo|pw}_sim-{seed}_pvals.json`. Sweeping seeds is left to the
//! job scheduler.

use anyhow::Result;
use clap::Args;

use isc_test_core::{AnalysisConfig, AppConfig, GridConfig};
use isc_test_simulation::GridReport;

/// Arguments for the grid command. Unset options fall back to `[grid]`.
#[derive(Args, Debug, Clone)]
pub struct GridArgs {
    /// Seed for this run
    pub seed: u64,

    /// Directory for the result file
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Comma-separated subject counts
    #[arg(long, value_delimiter = ',')]
    pub subjects: Option<Vec<usize>>,

    /// Comma-separated durations in time points
    #[arg(long, value_delimiter = ',')]
    pub durations: Option<Vec<usize>>,

    /// Comma-separated test names
    #[arg(long, value_delimiter = ',')]
    pub tests: Option<Vec<String>>,

    /// Randomized samples per test
    #[arg(long)]
    pub n_trials: Option<usize>,

    /// True inter-subject correlation of the simulated data
    #[arg(long)]
    pub true_correlation: Option<f64>,

    /// Use pairwise ISC instead of leave-one-out
    #[arg(long)]
    pub pairwise: bool,
}

/// Applies command-line overrides to the configured grid.
pub fn grid_config(args: &GridArgs, grid: &GridConfig) -> GridConfig {
    let mut config = grid.clone();
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(subjects) = &args.subjects {
        config.n_subjects = subjects.clone();
    }
    if let Some(durations) = &args.durations {
        config.n_time_points = durations.clone();
    }
    if let Some(tests) = &args.tests {
        config.tests = tests.clone();
    }
    if let Some(n_trials) = args.n_trials {
        config.n_trials = n_trials;
    }
    if let Some(r) = args.true_correlation {
        config.true_correlation = r;
    }
    if args.pairwise {
        config.pairwise = true;
    }
    config
}

/// Runs the whole grid for one seed on the blocking pool.
pub async fn simulate_grid(
    config: &GridConfig,
    analysis: &AnalysisConfig,
    seed: u64,
) -> Result<GridReport> {
    tracing::info!(
        seed,
        n_subjects = ?config.n_subjects,
        n_time_points = ?config.n_time_points,
        tests = ?config.tests,
        "starting grid simulation"
    );
    let grid = config.clone();
    let analysis = analysis.clone();
    tokio::task::spawn_blocking(move || isc_test_simulation::run_grid(&grid, &analysis, seed))
        .await?
}

/// Runs the grid command.
pub async fn run_grid(args: GridArgs, app: &AppConfig) -> Result<()> {
    let config = grid_config(&args, &app.grid);
    let report = simulate_grid(&config, &app.analysis, args.seed).await?;

    let path = report.write_json(&config.output_dir)?;
    tracing::info!("Grid results written to {}", path.display());
    println!("{}", path.display());

    Ok(())
}
