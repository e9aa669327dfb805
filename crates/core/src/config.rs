use serde::{Deserialize, Serialize};

use crate::isc::IscMode;
use crate::masked::NanTolerance;
use crate::pvalue::Side;
use crate::summary::SummaryStatistic;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub simulation: SimulationConfig,
    pub grid: GridConfig,
}

/// Settings shared by every significance test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub mode: IscMode,
    pub summary_statistic: SummaryStatistic,
    /// `true`, `false`, or a fraction in [0, 1].
    pub tolerate_nans: NanTolerance,
    pub n_trials: usize,
    pub seed: Option<u64>,
    pub side: Side,
    /// Count null samples (`true`) or fit a normal to them (`false`).
    pub exact: bool,
    pub parallel: bool,
    /// Percentile interval reported by the bootstrap.
    pub confidence_level: f64,
    /// Enumerate every sign pattern when it fits in `n_trials`.
    pub exhaustive_permutations: bool,
}

/// One false-positive-rate experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub n_time_points: usize,
    pub n_subjects: usize,
    pub true_correlation: f64,
    pub test: String,
    pub alpha: f64,
    pub n_simulations: usize,
    pub seed: u64,
    pub n_trials: usize,
    pub pairwise: bool,
}

/// Parameter sweep run once per seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub n_subjects: Vec<usize>,
    pub n_time_points: Vec<usize>,
    pub tests: Vec<String>,
    pub true_correlation: f64,
    pub n_trials: usize,
    pub pairwise: bool,
    pub output_dir: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            mode: IscMode::LeaveOneOut,
            summary_statistic: SummaryStatistic::Median,
            tolerate_nans: NanTolerance::Threshold(0.0),
            n_trials: 1000,
            seed: None,
            side: Side::TwoSided,
            exact: true,
            parallel: true,
            confidence_level: 0.95,
            exhaustive_permutations: false,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_time_points: 300,
            n_subjects: 20,
            true_correlation: 0.0,
            test: "timeshift".to_string(),
            alpha: 0.05,
            n_simulations: 100,
            seed: 0,
            n_trials: 1000,
            pairwise: false,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            n_subjects: vec![10, 20, 30, 50, 100, 200, 500, 1000],
            n_time_points: vec![50, 100, 300, 500, 1000, 2000],
            tests: [
                "ttest",
                "permutation",
                "bootstrap",
                "phaseshift",
                "timeshift",
                "signflip",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            true_correlation: 0.0,
            n_trials: 1000,
            pairwise: false,
            output_dir: "simulations".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_defaults() {
        let config = AnalysisConfig::default();

        assert_eq!(config.mode, IscMode::LeaveOneOut);
        assert_eq!(config.summary_statistic, SummaryStatistic::Median);
        assert_eq!(config.n_trials, 1000);
        assert!(config.exact);
        assert!(config.seed.is_none());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"analysis": {"mode": "pairwise", "tolerate_nans": 0.8, "n_trials": 50}}"#,
        )
        .unwrap();

        assert_eq!(config.analysis.mode, IscMode::Pairwise);
        assert_eq!(config.analysis.tolerate_nans, NanTolerance::Threshold(0.8));
        assert_eq!(config.analysis.n_trials, 50);
        assert_eq!(config.simulation.n_simulations, 100);
        assert_eq!(config.grid.tests.len(), 6);
    }
}
