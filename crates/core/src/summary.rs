//! Aggregation of ISC values across subjects or pairs.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::IscError;

/// Statistic used to collapse the subject/pair axis into one value per unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatistic {
    /// Fisher-z mean: `tanh(mean(atanh(r)))`.
    Mean,
    /// Median of the raw correlations.
    #[default]
    Median,
}

impl SummaryStatistic {
    /// Summarizes one lane of correlation values, ignoring NaNs.
    ///
    /// Returns NaN when no value is present.
    pub fn apply<I>(&self, values: I) -> f64
    where
        I: IntoIterator<Item = f64>,
    {
        let finite = values.into_iter().filter(|v| !v.is_nan());
        match self {
            Self::Mean => {
                let (sum, count) =
                    finite.fold((0.0, 0usize), |(sum, count), r| (sum + r.atanh(), count + 1));
                if count == 0 {
                    f64::NAN
                } else {
                    (sum / count as f64).tanh()
                }
            }
            Self::Median => {
                let mut sorted: Vec<f64> = finite.collect();
                median_of(&mut sorted)
            }
        }
    }

    /// Summarizes a (rows × units) array down its rows.
    #[must_use]
    pub fn summarize(&self, values: ArrayView2<'_, f64>) -> Array1<f64> {
        values.map_axis(Axis(0), |lane| self.apply(lane.iter().copied()))
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
        }
    }
}

impl fmt::Display for SummaryStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryStatistic {
    type Err = IscError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            _ => Err(IscError::InvalidValue(format!(
                "unknown summary statistic '{s}'. Valid statistics: mean, median"
            ))),
        }
    }
}

/// Median of a NaN-free slice; sorts in place.
fn median_of(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}
