//! Case bootstrap over subjects.
//!
//! Each trial resamples N subjects with replacement and recomputes the summary
//! statistic from their ISC values. The spread of those bootstrap statistics
//! gives a percentile confidence interval. Shifting them by the observed
//! statistic centers the distribution on zero, which is the null used for the
//! p-value.

use isc_test_core::isc::pair_index;
use isc_test_core::{compute_isc, IscResult, Result, TimeSeriesDataset};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use tracing::warn;

use crate::config::NullConfig;
use crate::kind::NullKind;
use crate::result::{ConfidenceInterval, NullDistribution};
use crate::seed_chain::SeedChain;
use crate::trial::run_trials;

/// Redraws allowed before a resample with a single distinct subject is given up.
pub const MAX_RESAMPLE_ATTEMPTS: usize = 100;

/// Bootstrap null distribution computed from the dataset.
///
/// # Errors
/// Returns [`isc_test_core::IscError::InvalidConfig`] for an invalid
/// configuration.
pub fn bootstrap(dataset: &TimeSeriesDataset, config: &NullConfig) -> Result<NullDistribution> {
    config.validate()?;
    let iscs = compute_isc(dataset, config.mode, config.tolerance);
    bootstrap_from_iscs(&iscs, config)
}

/// Bootstrap null distribution from precomputed ISC values.
///
/// Leave-one-out rows are resampled directly. Pairwise values are rebuilt
/// over the resampled subjects; a pair formed by one subject drawn twice is
/// NaN and ignored by the summary.
///
/// # Errors
/// Returns [`isc_test_core::IscError::InvalidConfig`] for an invalid
/// configuration.
pub fn bootstrap_from_iscs(iscs: &IscResult, config: &NullConfig) -> Result<NullDistribution> {
    config.validate()?;
    let statistic = config.summary_statistic;
    let n_subjects = iscs.n_subjects();
    let n_units = iscs.n_units();
    let values = iscs.values();
    let pairs = iscs.pairs();
    let observed = iscs.summarize(statistic);

    let chain = SeedChain::resolve(config.seed, config.n_trials);
    let samples = run_trials(&chain, config.parallel, n_units, |rng| {
        let Some(indices) = draw_resample(rng, n_subjects) else {
            warn!(
                n_subjects,
                attempts = MAX_RESAMPLE_ATTEMPTS,
                "no resample with two distinct subjects, recording NaN trial"
            );
            return Array1::from_elem(n_units, f64::NAN);
        };
        let resampled = match &pairs {
            Some(pairs) => resample_pairs(values, pairs, &indices, n_subjects),
            None => values.select(Axis(0), &indices),
        };
        statistic.summarize(resampled.view())
    });

    let interval = percentile_intervals(samples.view(), config.confidence_level);

    let mut shifted = samples;
    for mut row in shifted.rows_mut() {
        row -= &observed;
    }

    Ok(NullDistribution::new(
        NullKind::Bootstrap,
        observed,
        shifted,
        Some(chain.initial_seed()),
        config.side,
        config.p_value_method(),
    )?
    .with_confidence_interval(interval))
}

/// Draws N indices with replacement, redrawing while fewer than two distinct
/// subjects appear.
fn draw_resample<R: Rng + ?Sized>(rng: &mut R, n_subjects: usize) -> Option<Vec<usize>> {
    (0..MAX_RESAMPLE_ATTEMPTS).find_map(|_| {
        let indices: Vec<usize> = (0..n_subjects)
            .map(|_| rng.gen_range(0..n_subjects))
            .collect();
        let distinct = indices.iter().any(|&i| i != indices[0]);
        distinct.then_some(indices)
    })
}

fn resample_pairs(
    values: ArrayView2<'_, f64>,
    pairs: &[(usize, usize)],
    indices: &[usize],
    n_subjects: usize,
) -> Array2<f64> {
    let mut resampled = Array2::from_elem((pairs.len(), values.ncols()), f64::NAN);
    for (mut row, &(a, b)) in resampled.rows_mut().into_iter().zip(pairs) {
        let (i, j) = (indices[a], indices[b]);
        if i != j {
            row.assign(&values.row(pair_index(i, j, n_subjects)));
        }
    }
    resampled
}

/// Per-unit percentile bounds, skipping NaN trials.
fn percentile_intervals(samples: ArrayView2<'_, f64>, level: f64) -> ConfidenceInterval {
    let (lower, upper): (Vec<f64>, Vec<f64>) = samples
        .axis_iter(Axis(1))
        .map(|column| {
            let mut finite: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
            finite.sort_by(f64::total_cmp);
            percentile_ci(&finite, level)
        })
        .unzip();
    ConfidenceInterval {
        lower: Array1::from(lower),
        upper: Array1::from(upper),
        level,
    }
}

/// Percentile interval of a sorted distribution; NaN bounds when it is empty.
#[must_use]
pub fn percentile_ci(sorted: &[f64], confidence_level: f64) -> (f64, f64) {
    if sorted.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    if sorted.len() == 1 {
        return (sorted[0], sorted[0]);
    }

    let alpha = 1.0 - confidence_level;
    let n = sorted.len();

    let lower_idx = ((alpha / 2.0) * n as f64).floor() as usize;
    let upper_idx = ((1.0 - alpha / 2.0) * n as f64).ceil() as usize;

    let lower_idx = lower_idx.min(n - 1);
    let upper_idx = upper_idx.min(n - 1).max(lower_idx);

    (sorted[lower_idx], sorted[upper_idx])
}
