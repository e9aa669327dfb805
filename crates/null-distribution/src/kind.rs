//! Closed set of randomization schemes and the dispatch onto their
//! generators.

use std::fmt;
use std::str::FromStr;

use isc_test_core::{IscError, Result, TimeSeriesDataset};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bootstrap::bootstrap;
use crate::config::NullConfig;
use crate::permutation::permutation;
use crate::phaseshift::phase_shift;
use crate::result::NullDistribution;
use crate::signflip::sign_flip;
use crate::timeshift::time_shift;

/// Randomization scheme used to build a null distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullKind {
    SignFlip,
    TimeShift,
    PhaseShift,
    Permutation,
    Bootstrap,
}

impl NullKind {
    pub const ALL: [NullKind; 5] = [
        Self::SignFlip,
        Self::TimeShift,
        Self::PhaseShift,
        Self::Permutation,
        Self::Bootstrap,
    ];

    /// Builds the null distribution for `dataset`.
    ///
    /// # Errors
    /// Returns the generator's error for an invalid configuration or
    /// malformed group labels.
    pub fn generate(
        &self,
        dataset: &TimeSeriesDataset,
        config: &NullConfig,
    ) -> Result<NullDistribution> {
        let null = match self {
            Self::SignFlip => sign_flip(dataset, config),
            Self::TimeShift => time_shift(dataset, config),
            Self::PhaseShift => phase_shift(dataset, config),
            Self::Permutation => permutation(dataset, config),
            Self::Bootstrap => bootstrap(dataset, config),
        }?;

        debug!(
            kind = %self,
            mode = %config.mode,
            n_trials = null.n_trials(),
            n_units = null.n_units(),
            seed = ?null.seed,
            "null distribution generated"
        );
        Ok(null)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignFlip => "signflip",
            Self::TimeShift => "timeshift",
            Self::PhaseShift => "phaseshift",
            Self::Permutation => "permutation",
            Self::Bootstrap => "bootstrap",
        }
    }
}

impl fmt::Display for NullKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NullKind {
    type Err = IscError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "signflip" | "timeflip" => Ok(Self::SignFlip),
            "timeshift" => Ok(Self::TimeShift),
            "phaseshift" => Ok(Self::PhaseShift),
            "permutation" => Ok(Self::Permutation),
            "bootstrap" => Ok(Self::Bootstrap),
            _ => Err(IscError::InvalidValue(format!(
                "unknown null distribution '{s}'. Valid kinds: signflip, timeshift, phaseshift, permutation, bootstrap"
            ))),
        }
    }
}

/// Builds a null distribution of the given kind.
///
/// # Errors
/// Same conditions as [`NullKind::generate`].
pub fn null_distribution(
    kind: NullKind,
    dataset: &TimeSeriesDataset,
    config: &NullConfig,
) -> Result<NullDistribution> {
    kind.generate(dataset, config)
}
