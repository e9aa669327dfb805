//! False-positive-rate CLI command.

use anyhow::Result;
use clap::Args;

use isc_test_core::AppConfig;
use isc_test_simulation::{FprReport, SimulationParams};

use super::format::{format_p, OutputFormat};

/// Arguments for the fpr command. Unset options fall back to `[simulation]`.
#[derive(Args, Debug, Clone)]
pub struct FprArgs {
    /// Test: signflip, timeshift, phaseshift, permutation, bootstrap, ttest
    #[arg(short, long)]
    pub test: Option<String>,

    /// Subjects per simulated dataset
    #[arg(long)]
    pub n_subjects: Option<usize>,

    /// Time points per simulated dataset
    #[arg(long)]
    pub n_time_points: Option<usize>,

    /// True inter-subject correlation of the simulated data
    #[arg(long)]
    pub true_correlation: Option<f64>,

    /// Significance threshold
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Number of simulated datasets
    #[arg(long)]
    pub n_simulations: Option<usize>,

    /// Randomized samples per test
    #[arg(long)]
    pub n_trials: Option<usize>,

    /// Base seed; simulation i uses seed + i
    #[arg(long)]
    pub seed: Option<u64>,

    /// Use pairwise ISC instead of leave-one-out
    #[arg(long)]
    pub pairwise: bool,

    /// Output JSON results to file
    #[arg(long)]
    pub output: Option<String>,

    /// Output format: text, json (default: text)
    #[arg(long, default_value = "text")]
    pub format: String,
}

/// Resolves simulation parameters from config plus command-line overrides.
pub fn simulation_params(args: &FprArgs, config: &AppConfig) -> Result<SimulationParams> {
    let mut simulation = config.simulation.clone();
    if let Some(test) = &args.test {
        simulation.test = test.clone();
    }
    if let Some(n_subjects) = args.n_subjects {
        simulation.n_subjects = n_subjects;
    }
    if let Some(n_time_points) = args.n_time_points {
        simulation.n_time_points = n_time_points;
    }
    if let Some(r) = args.true_correlation {
        simulation.true_correlation = r;
    }
    if let Some(alpha) = args.alpha {
        simulation.alpha = alpha;
    }
    if let Some(n_simulations) = args.n_simulations {
        simulation.n_simulations = n_simulations;
    }
    if let Some(n_trials) = args.n_trials {
        simulation.n_trials = n_trials;
    }
    if let Some(seed) = args.seed {
        simulation.seed = seed;
    }
    if args.pairwise {
        simulation.pairwise = true;
    }

    let params = SimulationParams::from_config(&simulation, &config.analysis)?;
    params.validate()?;
    Ok(params)
}

/// Formats the false-positive-rate report as text.
pub fn format_text_report(report: &FprReport) -> String {
    let params = &report.params;
    let mut output = String::new();

    output.push('\n');
    output.push_str("===============================================================\n");
    output.push_str("                 FALSE POSITIVE RATE SIMULATION                \n");
    output.push_str("===============================================================\n");
    output.push_str(&format!("Test:            {}\n", params.test));
    output.push_str(&format!(
        "Design:          {}\n",
        if params.pairwise { "pairwise" } else { "leave-one-out" }
    ));
    output.push_str(&format!(
        "Data:            {} subjects x {} time points, r = {:.3}\n",
        params.n_subjects, params.n_time_points, params.true_correlation
    ));
    output.push_str(&format!(
        "Simulations:     {} (seeds {}..{})\n",
        params.n_simulations,
        params.seed,
        params.simulation_seed(params.n_simulations)
    ));
    output.push_str(&format!("Trials per test: {}\n", params.n_trials));
    output.push('\n');

    output.push_str("RESULTS\n");
    output.push_str("---------------------------------------------------------------\n");
    output.push_str(&format!(
        "Rejections:      {} of {} at alpha = {}\n",
        report.n_significant, params.n_simulations, params.alpha
    ));
    let label = if params.true_correlation == 0.0 {
        "False positive rate"
    } else {
        "Rejection rate"
    };
    output.push_str(&format!(
        "{}: {:.1}%\n",
        label,
        report.false_positive_rate * 100.0
    ));
    if report.n_undefined() > 0 {
        output.push_str(&format!("Undefined p:     {}\n", report.n_undefined()));
    }
    let mut sorted: Vec<f64> = report
        .p_values
        .iter()
        .copied()
        .filter(|p| !p.is_nan())
        .collect();
    sorted.sort_by(f64::total_cmp);
    if let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) {
        output.push_str(&format!(
            "p-value range:   {} to {}\n",
            format_p(min),
            format_p(max)
        ));
    }
    output.push_str(&format!(
        "Elapsed:         {:.1}s\n",
        (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0
    ));
    output.push_str("===============================================================\n");

    output
}

/// Runs the fpr command.
pub async fn run_fpr(args: FprArgs, config: &AppConfig) -> Result<()> {
    let format = OutputFormat::parse(&args.format)?;
    let params = simulation_params(&args, config)?;

    let report =
        tokio::task::spawn_blocking(move || isc_test_simulation::run_fpr(&params)).await??;

    let json = serde_json::to_string_pretty(&report)?;
    match format {
        OutputFormat::Text => println!("{}", format_text_report(&report)),
        OutputFormat::Json => println!("{}", json),
    }

    if let Some(path) = &args.output {
        std::fs::write(path, &json)?;
        tracing::info!("Results written to {}", path);
    }

    Ok(())
}
