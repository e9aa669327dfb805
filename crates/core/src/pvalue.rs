//! P-values from an observed statistic and a sampled null distribution.
//!
//! # Example
//!
//! ```
//! use isc_test_core::pvalue::{p_from_null, Side};
//! use ndarray::{array, Array2};
//!
//! let observed = array![0.9];
//! let null = Array2::from_shape_vec((4, 1), vec![0.1, -0.2, 0.05, 0.95]).unwrap();
//!
//! // One null sample at least as extreme: (1 + 1) / (4 + 1)
//! let p = p_from_null(observed.view(), null.view(), Side::TwoSided, true, 0).unwrap();
//! assert!((p[0] - 0.4).abs() < 1e-12);
//! ```

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{IscError, Result};

/// Direction of the comparison between observed and null samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Side {
    /// `|null| >= |observed|`
    #[default]
    TwoSided,
    /// `null >= observed`
    Greater,
    /// `null <= observed`
    Less,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TwoSided => f.write_str("two-sided"),
            Self::Greater => f.write_str("greater"),
            Self::Less => f.write_str("less"),
        }
    }
}

impl FromStr for Side {
    type Err = IscError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "two-sided" | "two_sided" | "both" => Ok(Self::TwoSided),
            "greater" | "right" => Ok(Self::Greater),
            "less" | "left" => Ok(Self::Less),
            _ => Err(IscError::InvalidValue(format!(
                "unknown side '{s}'. Valid sides: two-sided, greater, less"
            ))),
        }
    }
}

/// How the tail probability is estimated from the null samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PValueMethod {
    /// `(count + 1) / (n + 1)`; never returns zero.
    #[default]
    MonteCarlo,
    /// `count / n`, for nulls that enumerate every randomization.
    Enumerated,
    /// Tail of a normal distribution fitted to the null samples.
    NormalApproximation,
}

impl PValueMethod {
    /// Maps the `exact` flag: `true` counts null samples with the Monte-Carlo
    /// correction, `false` uses the normal approximation.
    #[must_use]
    pub fn from_exact(exact: bool) -> Self {
        if exact {
            Self::MonteCarlo
        } else {
            Self::NormalApproximation
        }
    }
}

/// Computes one p-value per unit.
///
/// `axis` is the trial axis of `null`: 0 for (trials × units), 1 for
/// (units × trials).
///
/// # Errors
/// Returns [`IscError::InvalidValue`] if `axis` is not 0 or 1 or the unit
/// count of `null` differs from `observed`, and [`IscError::InvalidConfig`]
/// if `exact` is false and the null has fewer than two trials.
pub fn p_from_null(
    observed: ArrayView1<'_, f64>,
    null: ArrayView2<'_, f64>,
    side: Side,
    exact: bool,
    axis: usize,
) -> Result<Array1<f64>> {
    p_from_null_with(observed, null, side, PValueMethod::from_exact(exact), axis)
}

/// [`p_from_null`] with an explicit estimation method.
///
/// # Errors
/// Same conditions as [`p_from_null`].
pub fn p_from_null_with(
    observed: ArrayView1<'_, f64>,
    null: ArrayView2<'_, f64>,
    side: Side,
    method: PValueMethod,
    axis: usize,
) -> Result<Array1<f64>> {
    if axis > 1 {
        return Err(IscError::InvalidValue(format!(
            "trial axis must be 0 or 1 for a 2-D null, got {axis}"
        )));
    }
    let trial_axis = Axis(axis);
    let unit_axis = Axis(1 - axis);

    if null.len_of(unit_axis) != observed.len() {
        return Err(IscError::InvalidValue(format!(
            "null has {} units along axis {}, observed has {}",
            null.len_of(unit_axis),
            1 - axis,
            observed.len()
        )));
    }

    let n_trials = null.len_of(trial_axis);
    if method == PValueMethod::NormalApproximation && n_trials < 2 {
        return Err(IscError::InvalidConfig(format!(
            "normal approximation needs at least 2 null samples, got {n_trials}"
        )));
    }

    Ok(observed
        .iter()
        .zip(null.axis_iter(unit_axis))
        .map(|(&obs, samples)| p_value(obs, samples, side, method))
        .collect())
}

/// P-value for a single observation; NaN samples are skipped.
///
/// Returns NaN if the observation is NaN or no usable sample remains.
#[must_use]
pub fn p_value(
    observed: f64,
    null: ArrayView1<'_, f64>,
    side: Side,
    method: PValueMethod,
) -> f64 {
    if observed.is_nan() {
        return f64::NAN;
    }
    let samples = null.iter().copied().filter(|v| !v.is_nan());

    match method {
        PValueMethod::MonteCarlo | PValueMethod::Enumerated => {
            let (count, n) = samples.fold((0usize, 0usize), |(count, n), sample| {
                let extreme = match side {
                    Side::TwoSided => sample.abs() >= observed.abs(),
                    Side::Greater => sample >= observed,
                    Side::Less => sample <= observed,
                };
                (count + usize::from(extreme), n + 1)
            });
            if n == 0 {
                return f64::NAN;
            }
            if method == PValueMethod::MonteCarlo {
                (count + 1) as f64 / (n + 1) as f64
            } else {
                count as f64 / n as f64
            }
        }
        PValueMethod::NormalApproximation => {
            let samples: Vec<f64> = samples.collect();
            normal_tail(observed, &samples, side)
        }
    }
}

fn normal_tail(observed: f64, samples: &[f64], side: Side) -> f64 {
    if samples.len() < 2 {
        return f64::NAN;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let sd = variance.sqrt();

    let Ok(normal) = Normal::new(mean, sd) else {
        // Degenerate null: every sample sits on the mean.
        let on_mean = match side {
            Side::TwoSided => observed.abs() <= mean.abs(),
            Side::Greater => observed <= mean,
            Side::Less => observed >= mean,
        };
        return if on_mean { 1.0 } else { 0.0 };
    };

    let p = match side {
        Side::TwoSided => normal.sf(observed.abs()) + normal.cdf(-observed.abs()),
        Side::Greater => normal.sf(observed),
        Side::Less => normal.cdf(observed),
    };
    p.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn null_column(samples: &[f64]) -> Array2<f64> {
        Array2::from_shape_vec((samples.len(), 1), samples.to_vec()).unwrap()
    }

    fn spread_null() -> Array2<f64> {
        let samples: Vec<f64> = (0..99).map(|i| (i as f64 - 49.0) / 100.0).collect();
        null_column(&samples)
    }

    // ============================================================
    // Side parsing
    // ============================================================

    #[test]
    fn side_accepts_aliases() {
        assert_eq!("two-sided".parse::<Side>().unwrap(), Side::TwoSided);
        assert_eq!("right".parse::<Side>().unwrap(), Side::Greater);
        assert_eq!("left".parse::<Side>().unwrap(), Side::Less);
        assert!(matches!(
            "sideways".parse::<Side>(),
            Err(IscError::InvalidValue(_))
        ));
    }

    // ============================================================
    // Empirical estimates
    // ============================================================

    #[test]
    fn monte_carlo_correction_never_returns_zero() {
        let null = spread_null();
        let observed = array![10.0];

        let p = p_from_null(observed.view(), null.view(), Side::TwoSided, true, 0).unwrap();

        assert!((p[0] - 1.0 / 100.0).abs() < 1e-12);
    }

    #[test]
    fn enumerated_has_no_correction() {
        let null = null_column(&[0.1, 0.2, 0.3, 0.4]);
        let observed = array![0.35];

        let p = p_from_null_with(
            observed.view(),
            null.view(),
            Side::Greater,
            PValueMethod::Enumerated,
            0,
        )
        .unwrap();

        assert!((p[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn one_sided_uses_signed_comparison() {
        let null = null_column(&[-0.5, -0.4, 0.1, 0.2]);
        let observed = array![-0.45];

        let greater = p_from_null(observed.view(), null.view(), Side::Greater, true, 0).unwrap();
        let less = p_from_null(observed.view(), null.view(), Side::Less, true, 0).unwrap();
        let both = p_from_null(observed.view(), null.view(), Side::TwoSided, true, 0).unwrap();

        assert!((greater[0] - 4.0 / 5.0).abs() < 1e-12);
        assert!((less[0] - 2.0 / 5.0).abs() < 1e-12);
        assert!((both[0] - 2.0 / 5.0).abs() < 1e-12);
    }

    #[test]
    fn extreme_observation_has_smaller_p_than_median() {
        let null = spread_null();
        let extreme = array![0.6];
        let central = array![0.01];

        for exact in [true, false] {
            let p_extreme =
                p_from_null(extreme.view(), null.view(), Side::TwoSided, exact, 0).unwrap();
            let p_central =
                p_from_null(central.view(), null.view(), Side::TwoSided, exact, 0).unwrap();

            assert!(p_extreme[0] < p_central[0], "exact={exact}");
        }
    }

    #[test]
    fn nan_samples_are_skipped_and_nan_observed_propagates() {
        let null = null_column(&[0.1, f64::NAN, 0.3]);
        let observed = array![0.2, f64::NAN];
        let null2 = Array2::from_shape_fn((3, 2), |(t, _)| null[[t, 0]]);

        let p = p_from_null(observed.view(), null2.view(), Side::Greater, true, 0).unwrap();

        assert!((p[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!(p[1].is_nan());
    }

    // ============================================================
    // Axis handling
    // ============================================================

    #[test]
    fn axis_one_reads_units_by_trials() {
        let null = spread_null().reversed_axes();
        let observed = array![10.0];

        let p = p_from_null(observed.view(), null.view(), Side::TwoSided, true, 1).unwrap();

        assert!((p[0] - 0.01).abs() < 1e-12);
    }

    #[test]
    fn unit_mismatch_is_rejected() {
        let null = Array2::<f64>::zeros((10, 3));
        let observed = array![0.1, 0.2];

        let result = p_from_null(observed.view(), null.view(), Side::TwoSided, true, 0);

        assert!(matches!(result, Err(IscError::InvalidValue(_))));
    }

    #[test]
    fn invalid_axis_is_rejected() {
        let null = Array2::<f64>::zeros((10, 1));
        let observed = array![0.1];

        let result = p_from_null(observed.view(), null.view(), Side::TwoSided, true, 2);

        assert!(matches!(result, Err(IscError::InvalidValue(_))));
    }

    // ============================================================
    // Normal approximation
    // ============================================================

    #[test]
    fn normal_approximation_needs_two_trials() {
        let null = Array2::<f64>::zeros((1, 1));
        let observed = array![0.1];

        let result = p_from_null(observed.view(), null.view(), Side::TwoSided, false, 0);

        assert!(matches!(result, Err(IscError::InvalidConfig(_))));
    }

    #[test]
    fn normal_approximation_matches_standard_tail() {
        // Symmetric null with mean 0 and sample sd 1.
        let null = null_column(&[-1.0, 1.0, -1.0, 1.0]);
        let sd = (4.0f64 / 3.0).sqrt();
        let null = null.mapv(|v| v / sd);
        let observed = array![1.96];

        let p = p_from_null(observed.view(), null.view(), Side::TwoSided, false, 0).unwrap();

        assert!((p[0] - 0.05).abs() < 1e-3, "p was {}", p[0]);
    }

    #[test]
    fn normal_approximation_degenerate_null() {
        let null = null_column(&[0.0, 0.0, 0.0]);

        let on_mean = p_from_null(array![0.0].view(), null.view(), Side::TwoSided, false, 0)
            .unwrap();
        let off_mean = p_from_null(array![0.3].view(), null.view(), Side::TwoSided, false, 0)
            .unwrap();

        assert!((on_mean[0] - 1.0).abs() < f64::EPSILON);
        assert!(off_mean[0].abs() < f64::EPSILON);
    }
}
