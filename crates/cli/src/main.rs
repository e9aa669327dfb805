use clap::{Parser, Subcommand};

mod commands;

use commands::{AnalyzeArgs, FprArgs, GridArgs, SimulateArgs};
use isc_test_core::ConfigLoader;

#[derive(Parser)]
#[command(name = "isc-test")]
#[command(about = "Nonparametric significance tests for inter-subject correlation", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = "config/Config.toml")]
    config: String,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test the ISC of recorded data against a randomized null
    Analyze(AnalyzeArgs),
    /// Estimate the false-positive rate of one test on simulated data
    Fpr(FprArgs),
    /// Run every configured test over a grid of subject counts and durations
    Grid(GridArgs),
    /// Write a simulated (time point x subject) dataset to CSV
    Simulate(SimulateArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.log_file.as_deref() {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            // stdout carries reports, so logs go to stderr
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .with_writer(std::io::stderr)
                .init();
        }
    }

    let config = ConfigLoader::load(&cli.config)?;
    tracing::debug!(path = %cli.config, "configuration loaded");

    match cli.command {
        Commands::Analyze(args) => commands::run_analyze(args, &config.analysis).await?,
        Commands::Fpr(args) => commands::run_fpr(args, &config).await?,
        Commands::Grid(args) => commands::run_grid(args, &config).await?,
        Commands::Simulate(args) => commands::run_simulate(args).await?,
    }

    Ok(())
}
