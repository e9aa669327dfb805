//! NaN-tolerant averaging across subjects.
//!
//! Leave-one-out ISC correlates each subject with the mean of the remaining
//! N-1 subjects. Missing cells are dropped from that mean, and a
//! [`NanTolerance`] decides whether enough subjects remain at a time point for
//! the mean to count. A time point that fails the rule becomes NaN, which
//! later turns the whole unit's correlation into NaN.

use std::str::FromStr;

use ndarray::{Array1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{IscError, Result};

/// Policy for missing values when averaging comparison subjects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NanToleranceRepr", into = "NanToleranceRepr")]
pub enum NanTolerance {
    /// Any NaN among the averaged subjects makes the mean NaN.
    Strict,
    /// At least this fraction of the averaged subjects must be non-NaN.
    /// `Threshold(0.0)` uses whatever data is available.
    Threshold(f64),
}

impl Default for NanTolerance {
    fn default() -> Self {
        Self::Threshold(0.0)
    }
}

impl NanTolerance {
    /// Creates a fractional threshold policy.
    ///
    /// # Errors
    /// Returns [`IscError::InvalidConfig`] unless `fraction` is within [0, 1].
    pub fn threshold(fraction: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(IscError::InvalidConfig(format!(
                "NaN tolerance threshold must be within [0, 1], got {fraction}"
            )));
        }
        Ok(Self::Threshold(fraction))
    }

    /// Returns true if `valid` non-NaN values out of `total` are enough.
    #[must_use]
    pub fn admits(&self, valid: usize, total: usize) -> bool {
        if valid == 0 {
            return false;
        }
        match self {
            Self::Strict => valid == total,
            Self::Threshold(fraction) => valid as f64 / total as f64 >= *fraction,
        }
    }
}

impl From<bool> for NanTolerance {
    fn from(tolerate: bool) -> Self {
        if tolerate {
            Self::Threshold(0.0)
        } else {
            Self::Strict
        }
    }
}

impl FromStr for NanTolerance {
    type Err = IscError;

    /// Accepts `strict`/`false`, `true`/`all`, or a fraction in [0, 1].
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" | "false" => Ok(Self::Strict),
            "true" | "all" => Ok(Self::Threshold(0.0)),
            other => {
                let fraction = other.parse::<f64>().map_err(|_| {
                    IscError::InvalidValue(format!(
                        "unknown NaN tolerance '{s}'. Use strict, true, or a fraction in [0, 1]"
                    ))
                })?;
                Self::threshold(fraction)
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum NanToleranceRepr {
    Flag(bool),
    Threshold(f64),
}

impl TryFrom<NanToleranceRepr> for NanTolerance {
    type Error = IscError;

    fn try_from(repr: NanToleranceRepr) -> Result<Self> {
        match repr {
            NanToleranceRepr::Flag(flag) => Ok(flag.into()),
            NanToleranceRepr::Threshold(fraction) => Self::threshold(fraction),
        }
    }
}

impl From<NanTolerance> for NanToleranceRepr {
    fn from(tolerance: NanTolerance) -> Self {
        match tolerance {
            NanTolerance::Strict => Self::Flag(false),
            NanTolerance::Threshold(fraction) => Self::Threshold(fraction),
        }
    }
}

/// Mean of `values` ignoring NaNs, or NaN if `tolerance` rejects the count.
pub fn masked_mean<I>(values: I, tolerance: NanTolerance) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut sum = 0.0;
    let mut valid = 0usize;
    let mut total = 0usize;
    for value in values {
        total += 1;
        if !value.is_nan() {
            sum += value;
            valid += 1;
        }
    }

    if tolerance.admits(valid, total) {
        sum / valid as f64
    } else {
        f64::NAN
    }
}

/// Per-time-point masked mean over the subject columns of a
/// (time point × subject) block, skipping the `exclude`d subject.
#[must_use]
pub fn masked_mean_excluding(
    block: ArrayView2<'_, f64>,
    exclude: Option<usize>,
    tolerance: NanTolerance,
) -> Array1<f64> {
    block.map_axis(Axis(1), |row| {
        masked_mean(
            row.iter()
                .enumerate()
                .filter(|(subject, _)| Some(*subject) != exclude)
                .map(|(_, value)| *value),
            tolerance,
        )
    })
}
