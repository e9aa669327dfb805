//! Parametric baseline: one-sample t-test of ISC values against zero.
//!
//! Treats every ISC value as an independent observation, which pairwise and
//! leave-one-out values are not. It is kept to show how badly that
//! assumption inflates false positives.

use isc_test_core::Side;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Result of a one-sample t-test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TTestResult {
    /// t statistic.
    pub statistic: f64,
    /// Degrees of freedom (n - 1).
    pub df: f64,
    pub p_value: f64,
}

impl TTestResult {
    fn undefined(df: f64) -> Self {
        Self {
            statistic: f64::NAN,
            df,
            p_value: f64::NAN,
        }
    }
}

/// One-sample t-test of `values` against `popmean`, skipping NaNs.
///
/// Fewer than two values, or zero spread, give NaN statistic and p-value.
#[must_use]
pub fn one_sample_ttest(values: ArrayView1<'_, f64>, popmean: f64, side: Side) -> TTestResult {
    let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    let n = finite.len() as f64;
    let df = n - 1.0;
    if finite.len() < 2 {
        return TTestResult::undefined(df);
    }

    let mean = finite.iter().sum::<f64>() / n;
    let variance = finite.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / df;
    let std_error = (variance / n).sqrt();
    if std_error <= f64::EPSILON {
        return TTestResult::undefined(df);
    }

    let statistic = (mean - popmean) / std_error;
    let Ok(dist) = StudentsT::new(0.0, 1.0, df) else {
        return TTestResult::undefined(df);
    };
    let p_value = match side {
        Side::TwoSided => 2.0 * dist.sf(statistic.abs()),
        Side::Greater => dist.sf(statistic),
        Side::Less => dist.cdf(statistic),
    };

    TTestResult {
        statistic,
        df,
        p_value: p_value.clamp(0.0, 1.0),
    }
}

/// Runs [`one_sample_ttest`] against zero down each unit of a (rows × units)
/// ISC array.
#[must_use]
pub fn ttest_units(iscs: ArrayView2<'_, f64>, side: Side) -> Vec<TTestResult> {
    iscs.axis_iter(Axis(1))
        .map(|unit| one_sample_ttest(unit, 0.0, side))
        .collect()
}

/// p-values of [`ttest_units`].
#[must_use]
pub fn ttest_p_values(iscs: ArrayView2<'_, f64>, side: Side) -> Array1<f64> {
    ttest_units(iscs, side)
        .into_iter()
        .map(|result| result.p_value)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn matches_reference_values() {
        // mean 3, sd sqrt(2.5), n 5: t = 3 / sqrt(0.5) = 4.2426, df 4
        let values = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let result = one_sample_ttest(values.view(), 0.0, Side::TwoSided);

        assert!((result.statistic - 4.242_640_687).abs() < 1e-6);
        assert!((result.df - 4.0).abs() < f64::EPSILON);
        assert!((result.p_value - 0.013_236).abs() < 1e-4, "p was {}", result.p_value);
    }

    #[test]
    fn one_sided_halves_two_sided_in_the_right_direction() {
        let values = array![0.1, 0.3, 0.2, 0.4, 0.25];

        let two = one_sample_ttest(values.view(), 0.0, Side::TwoSided);
        let greater = one_sample_ttest(values.view(), 0.0, Side::Greater);
        let less = one_sample_ttest(values.view(), 0.0, Side::Less);

        assert!((greater.p_value - two.p_value / 2.0).abs() < 1e-12);
        assert!((less.p_value - (1.0 - greater.p_value)).abs() < 1e-12);
    }

    #[test]
    fn nan_values_are_skipped() {
        let with_nan = array![1.0, f64::NAN, 2.0, 3.0, 4.0, 5.0];
        let without = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let a = one_sample_ttest(with_nan.view(), 0.0, Side::TwoSided);
        let b = one_sample_ttest(without.view(), 0.0, Side::TwoSided);

        assert!((a.p_value - b.p_value).abs() < 1e-12);
    }

    #[test]
    fn degenerate_input_is_nan() {
        assert!(one_sample_ttest(array![0.5].view(), 0.0, Side::TwoSided)
            .p_value
            .is_nan());
        assert!(one_sample_ttest(array![0.5, 0.5, 0.5].view(), 0.0, Side::TwoSided)
            .p_value
            .is_nan());
    }

    #[test]
    fn units_are_tested_independently() {
        let iscs = array![[0.1, -0.3], [0.3, 0.2], [0.2, 0.1], [0.4, -0.1]];

        let p = ttest_p_values(iscs.view(), Side::TwoSided);

        assert_eq!(p.len(), 2);
        assert!(p[0] < p[1]);
    }
}
