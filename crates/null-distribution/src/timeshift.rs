//! Circular time-shift randomization.
//!
//! Rotating a subject's series along time keeps its autocorrelation but
//! breaks its alignment with the stimulus.

use isc_test_core::isc::leave_one_out_means;
use isc_test_core::{compute_isc, IscMode, Result, TimeSeriesDataset};
use ndarray::{s, Array2, ArrayView2};
use rand::Rng;

use crate::config::NullConfig;
use crate::kind::NullKind;
use crate::result::NullDistribution;
use crate::seed_chain::SeedChain;
use crate::trial::{leave_one_out_trial, pairwise_trial, run_trials};

/// Rotates a (time point × unit) block forward by `shift` time points, so
/// row `t` moves to row `(t + shift) mod T`.
#[must_use]
pub fn circular_shift(block: ArrayView2<'_, f64>, shift: usize) -> Array2<f64> {
    let n_time_points = block.nrows();
    if n_time_points == 0 {
        return block.to_owned();
    }
    let shift = shift % n_time_points;
    let split = n_time_points - shift;

    let mut shifted = Array2::<f64>::zeros(block.raw_dim());
    shifted
        .slice_mut(s![shift.., ..])
        .assign(&block.slice(s![..split, ..]));
    shifted
        .slice_mut(s![..shift, ..])
        .assign(&block.slice(s![split.., ..]));
    shifted
}

fn draw_shifts<R: Rng + ?Sized>(rng: &mut R, n_subjects: usize, n_time_points: usize) -> Vec<usize> {
    (0..n_subjects)
        .map(|_| rng.gen_range(0..n_time_points))
        .collect()
}

/// Circular time-shift null distribution.
///
/// Every trial draws a shift in `[0, T)` per subject. Pairwise shifts all
/// subjects; leave-one-out shifts the held-out subject only, against the
/// unshifted mean of the others.
///
/// # Errors
/// Returns [`isc_test_core::IscError::InvalidConfig`] for an invalid
/// configuration.
pub fn time_shift(dataset: &TimeSeriesDataset, config: &NullConfig) -> Result<NullDistribution> {
    config.validate()?;
    let statistic = config.summary_statistic;
    let (n_time_points, n_units, n_subjects) = dataset.extents();

    let observed = compute_isc(dataset, config.mode, config.tolerance).summarize(statistic);
    let chain = SeedChain::resolve(config.seed, config.n_trials);

    let distribution = match config.mode {
        IscMode::LeaveOneOut => {
            let means = leave_one_out_means(dataset, config.tolerance);
            run_trials(&chain, config.parallel, n_units, |rng| {
                let shifts = draw_shifts(rng, n_subjects, n_time_points);
                leave_one_out_trial(dataset, &means, statistic, |subject, block| {
                    circular_shift(block, shifts[subject])
                })
            })
        }
        IscMode::Pairwise => run_trials(&chain, config.parallel, n_units, |rng| {
            let shifts = draw_shifts(rng, n_subjects, n_time_points);
            pairwise_trial(dataset, statistic, |subject, mut block| {
                let shifted = circular_shift(block.view(), shifts[subject]);
                block.assign(&shifted);
            })
        }),
    };

    NullDistribution::new(
        NullKind::TimeShift,
        observed,
        distribution,
        Some(chain.initial_seed()),
        config.side,
        config.p_value_method(),
    )
}
