use std::fmt;
use std::str::FromStr;

use isc_test_core::{compute_isc, IscError, Result, TimeSeriesDataset};
use isc_test_null::{NullConfig, NullDistribution, NullKind};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::ttest::ttest_p_values;

/// A significance test the harness can run on a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TestKind {
    /// Parametric one-sample t-test on the raw ISC values.
    TTest,
    Randomized(NullKind),
}

/// Observed statistic and p-values of one test run.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub observed: Array1<f64>,
    pub p_values: Array1<f64>,
    /// Present for randomization tests.
    pub null: Option<NullDistribution>,
}

impl TestKind {
    pub const ALL: [TestKind; 6] = [
        Self::TTest,
        Self::Randomized(NullKind::Permutation),
        Self::Randomized(NullKind::Bootstrap),
        Self::Randomized(NullKind::PhaseShift),
        Self::Randomized(NullKind::TimeShift),
        Self::Randomized(NullKind::SignFlip),
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TTest => "ttest",
            Self::Randomized(kind) => kind.as_str(),
        }
    }

    /// Runs the test with the design, statistic and randomization settings
    /// of `config`.
    ///
    /// # Errors
    /// Propagates configuration errors from the null generators.
    pub fn run(&self, dataset: &TimeSeriesDataset, config: &NullConfig) -> Result<TestOutcome> {
        match self {
            Self::TTest => {
                let iscs = compute_isc(dataset, config.mode, config.tolerance);
                Ok(TestOutcome {
                    observed: iscs.summarize(config.summary_statistic),
                    p_values: ttest_p_values(iscs.values(), config.side),
                    null: None,
                })
            }
            Self::Randomized(kind) => {
                let null = kind.generate(dataset, config)?;
                Ok(TestOutcome {
                    observed: null.observed.clone(),
                    p_values: null.p_values.clone(),
                    null: Some(null),
                })
            }
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestKind {
    type Err = IscError;

    /// Accepts the short names plus the `_isc` suffixed and `ttest_1samp`
    /// spellings used in older result files.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s.to_lowercase();
        match name.as_str() {
            "ttest" | "ttest_1samp" | "t-test" => Ok(Self::TTest),
            other => other
                .trim_end_matches("_isc")
                .parse::<NullKind>()
                .map(Self::Randomized)
                .map_err(|_| {
                    IscError::InvalidValue(format!(
                        "unknown test '{s}'. Valid tests: ttest, permutation, bootstrap, phaseshift, timeshift, signflip"
                    ))
                }),
        }
    }
}

impl From<TestKind> for String {
    fn from(kind: TestKind) -> Self {
        kind.as_str().to_string()
    }
}

impl TryFrom<String> for TestKind {
    type Error = IscError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}
