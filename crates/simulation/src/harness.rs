//! False-positive-rate harness.
//!
//! Runs one test on many simulated datasets and counts how often it rejects
//! at `alpha`. With `true_correlation = 0` every rejection is a false
//! positive.

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Utc};
use isc_test_core::{
    AnalysisConfig, IscMode, NanTolerance, Side, SimulationConfig, SummaryStatistic,
};
use isc_test_null::NullConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::generator::correlated_dataset;
use crate::kind::TestKind;

/// Parameters of one false-positive-rate experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub n_time_points: usize,
    pub n_subjects: usize,
    /// Covariance between subjects; variance is 1, so this is also the
    /// correlation.
    pub true_correlation: f64,
    pub test: TestKind,
    pub alpha: f64,
    pub n_simulations: usize,
    /// Simulation `i` draws its data (and its null) from `seed + i`.
    pub seed: u64,
    pub n_trials: usize,
    pub pairwise: bool,
    pub summary_statistic: SummaryStatistic,
    pub tolerance: NanTolerance,
    pub side: Side,
    pub parallel: bool,
}

impl SimulationParams {
    #[must_use]
    pub fn new(n_time_points: usize, n_subjects: usize, test: TestKind) -> Self {
        Self {
            n_time_points,
            n_subjects,
            true_correlation: 0.0,
            test,
            alpha: 0.05,
            n_simulations: 100,
            seed: 0,
            n_trials: 1000,
            pairwise: false,
            summary_statistic: SummaryStatistic::Median,
            tolerance: NanTolerance::default(),
            side: Side::TwoSided,
            parallel: true,
        }
    }

    /// Builds parameters from loaded configuration.
    ///
    /// # Errors
    /// Returns an error if the configured test name is unknown.
    pub fn from_config(simulation: &SimulationConfig, analysis: &AnalysisConfig) -> Result<Self> {
        let test = simulation
            .test
            .parse::<TestKind>()
            .with_context(|| format!("invalid simulation test '{}'", simulation.test))?;
        Ok(Self {
            n_time_points: simulation.n_time_points,
            n_subjects: simulation.n_subjects,
            true_correlation: simulation.true_correlation,
            test,
            alpha: simulation.alpha,
            n_simulations: simulation.n_simulations,
            seed: simulation.seed,
            n_trials: simulation.n_trials,
            pairwise: simulation.pairwise,
            summary_statistic: analysis.summary_statistic,
            tolerance: analysis.tolerate_nans,
            side: analysis.side,
            parallel: analysis.parallel,
        })
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_true_correlation(mut self, r: f64) -> Self {
        self.true_correlation = r;
        self
    }

    #[must_use]
    pub fn with_simulations(mut self, n_simulations: usize) -> Self {
        self.n_simulations = n_simulations;
        self
    }

    #[must_use]
    pub fn with_trials(mut self, n_trials: usize) -> Self {
        self.n_trials = n_trials;
        self
    }

    #[must_use]
    pub fn with_pairwise(mut self, pairwise: bool) -> Self {
        self.pairwise = pairwise;
        self
    }

    #[must_use]
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: NanTolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Randomization settings for simulation `index`.
    #[must_use]
    pub fn null_config(&self, index: usize) -> NullConfig {
        NullConfig::new(IscMode::from_pairwise(self.pairwise), self.n_trials)
            .with_seed(self.simulation_seed(index))
            .with_summary(self.summary_statistic)
            .with_tolerance(self.tolerance)
            .with_side(self.side)
            .with_parallel(self.parallel)
    }

    #[must_use]
    pub fn simulation_seed(&self, index: usize) -> u64 {
        self.seed.wrapping_add(index as u64)
    }

    /// # Errors
    /// Returns an error if `alpha` is outside (0, 1) or no simulation would run.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.alpha > 0.0 && self.alpha < 1.0,
            "alpha must be within (0, 1), got {}",
            self.alpha
        );
        ensure!(self.n_simulations >= 1, "n_simulations must be at least 1");
        Ok(())
    }
}

/// Outcome of [`run_fpr`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FprReport {
    pub params: SimulationParams,
    /// Share of simulations with p < alpha.
    pub false_positive_rate: f64,
    pub n_significant: usize,
    /// First unit's p-value per simulation, in simulation order.
    pub p_values: Vec<f64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl FprReport {
    /// Simulations whose p-value came out NaN.
    #[must_use]
    pub fn n_undefined(&self) -> usize {
        self.p_values.iter().filter(|p| p.is_nan()).count()
    }
}

/// Runs `params.n_simulations` simulated experiments and tallies rejections.
///
/// # Errors
/// Returns an error for invalid parameters or if data generation or the test
/// fails.
pub fn run_fpr(params: &SimulationParams) -> Result<FprReport> {
    params.validate()?;
    let started_at = Utc::now();
    info!(
        test = %params.test,
        n_subjects = params.n_subjects,
        n_time_points = params.n_time_points,
        n_simulations = params.n_simulations,
        pairwise = params.pairwise,
        "starting false-positive-rate simulation"
    );

    let mut p_values = Vec::with_capacity(params.n_simulations);
    for index in 0..params.n_simulations {
        let seed = params.simulation_seed(index);
        let dataset = correlated_dataset(
            params.n_time_points,
            params.n_subjects,
            params.true_correlation,
            seed,
        )
        .with_context(|| format!("failed to simulate data for seed {seed}"))?;

        let outcome = params
            .test
            .run(&dataset, &params.null_config(index))
            .with_context(|| format!("{} failed on simulation {index}", params.test))?;
        let p = outcome.p_values.first().copied().unwrap_or(f64::NAN);
        debug!(index, seed, p, "simulation finished");
        p_values.push(p);
    }

    let n_significant = p_values.iter().filter(|&&p| p < params.alpha).count();
    let false_positive_rate = n_significant as f64 / params.n_simulations as f64;
    info!(
        test = %params.test,
        false_positive_rate,
        n_significant,
        "false-positive-rate simulation finished"
    );

    Ok(FprReport {
        params: params.clone(),
        false_positive_rate,
        n_significant,
        p_values,
        started_at,
        finished_at: Utc::now(),
    })
}
