//! Configuration shared by every null-distribution generator.

use isc_test_core::{
    AnalysisConfig, IscError, IscMode, NanTolerance, PValueMethod, Result, Side,
    SummaryStatistic,
};
use serde::{Deserialize, Serialize};

/// Configuration for a randomization test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NullConfig {
    /// Pairwise or leave-one-out ISC.
    pub mode: IscMode,
    /// Statistic computed on each randomized sample.
    pub summary_statistic: SummaryStatistic,
    /// Number of randomized samples.
    pub n_trials: usize,
    /// Missing-data policy for the leave-one-out mean.
    pub tolerance: NanTolerance,
    /// Initial seed of the seed chain; drawn from OS entropy when absent.
    pub seed: Option<u64>,
    /// Tail compared by the p-value.
    pub side: Side,
    /// Count null samples (`true`) or fit a normal to them (`false`).
    pub exact: bool,
    /// Run trials on the rayon pool.
    pub parallel: bool,
    /// Confidence level for the bootstrap percentile interval.
    pub confidence_level: f64,
    /// Enumerate all 2^N sign patterns in the permutation test when they fit
    /// within `n_trials`.
    pub exhaustive_permutations: bool,
    /// Group label (0 or 1) per subject for the two-group permutation test.
    pub groups: Option<Vec<usize>>,
}

impl Default for NullConfig {
    fn default() -> Self {
        Self {
            mode: IscMode::LeaveOneOut,
            summary_statistic: SummaryStatistic::Median,
            n_trials: 1000,
            tolerance: NanTolerance::default(),
            seed: None,
            side: Side::TwoSided,
            exact: true,
            parallel: true,
            confidence_level: 0.95,
            exhaustive_permutations: false,
            groups: None,
        }
    }
}

impl NullConfig {
    /// Creates a configuration with the given design and trial count.
    #[must_use]
    pub fn new(mode: IscMode, n_trials: usize) -> Self {
        Self {
            mode,
            n_trials,
            ..Default::default()
        }
    }

    /// Sets a seed for reproducible null distributions.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_summary(mut self, statistic: SummaryStatistic) -> Self {
        self.summary_statistic = statistic;
        self
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: NanTolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    #[must_use]
    pub fn with_exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    #[must_use]
    pub fn with_confidence_level(mut self, confidence_level: f64) -> Self {
        self.confidence_level = confidence_level;
        self
    }

    #[must_use]
    pub fn with_exhaustive_permutations(mut self, exhaustive: bool) -> Self {
        self.exhaustive_permutations = exhaustive;
        self
    }

    #[must_use]
    pub fn with_groups(mut self, groups: Vec<usize>) -> Self {
        self.groups = Some(groups);
        self
    }

    /// P-value estimator selected by `exact`.
    #[must_use]
    pub fn p_value_method(&self) -> PValueMethod {
        PValueMethod::from_exact(self.exact)
    }

    /// Checks the settings every generator relies on.
    ///
    /// # Errors
    /// Returns [`IscError::InvalidConfig`] if `n_trials` is zero or the
    /// confidence level is not strictly between 0 and 1.
    pub fn validate(&self) -> Result<()> {
        if self.n_trials < 1 {
            return Err(IscError::InvalidConfig(
                "n_trials must be at least 1".to_string(),
            ));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(IscError::InvalidConfig(format!(
                "confidence level must be within (0, 1), got {}",
                self.confidence_level
            )));
        }
        Ok(())
    }
}

impl From<&AnalysisConfig> for NullConfig {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            mode: config.mode,
            summary_statistic: config.summary_statistic,
            n_trials: config.n_trials,
            tolerance: config.tolerate_nans,
            seed: config.seed,
            side: config.side,
            exact: config.exact,
            parallel: config.parallel,
            confidence_level: config.confidence_level,
            exhaustive_permutations: config.exhaustive_permutations,
            groups: None,
        }
    }
}
