//! Sign-flip randomization.
//!
//! After mean-centering, a subject whose series is multiplied by -1 is
//! indistinguishable from the original under the null of no shared signal.
//! Each trial draws one sign per subject.

use isc_test_core::isc::leave_one_out_means;
use isc_test_core::{compute_isc, IscError, IscMode, Result, TimeSeriesDataset};
use ndarray::Array2;
use rand::Rng;

use crate::config::NullConfig;
use crate::kind::NullKind;
use crate::result::NullDistribution;
use crate::seed_chain::SeedChain;
use crate::trial::{leave_one_out_trial, pairwise_trial, run_trials};

/// Draws +1 or -1 with equal probability for every subject.
pub fn draw_flips<R: Rng + ?Sized>(rng: &mut R, n_subjects: usize) -> Vec<f64> {
    (0..n_subjects)
        .map(|_| if rng.gen_bool(0.5) { -1.0 } else { 1.0 })
        .collect()
}

/// Multiplies every subject's block by its sign.
///
/// # Errors
/// Returns [`IscError::Shape`] if `flips` does not hold one sign per subject.
pub fn apply_flips(dataset: &TimeSeriesDataset, flips: &[f64]) -> Result<TimeSeriesDataset> {
    if flips.len() != dataset.n_subjects() {
        return Err(IscError::Shape(format!(
            "{} signs for {} subjects",
            flips.len(),
            dataset.n_subjects()
        )));
    }
    Ok(dataset.map_subjects(|subject, mut block| {
        let sign = flips[subject];
        block.mapv_inplace(|v| v * sign);
    }))
}

/// Sign-flip null distribution.
///
/// Pairwise flips all subjects and recomputes every pair. Leave-one-out flips
/// only the held-out subject and correlates it with the unflipped mean of the
/// others.
///
/// # Errors
/// Returns [`IscError::InvalidConfig`] for an invalid configuration.
pub fn sign_flip(dataset: &TimeSeriesDataset, config: &NullConfig) -> Result<NullDistribution> {
    config.validate()?;
    let centered = dataset.mean_centered();
    let statistic = config.summary_statistic;
    let n_subjects = centered.n_subjects();

    let observed = compute_isc(&centered, config.mode, config.tolerance).summarize(statistic);
    let chain = SeedChain::resolve(config.seed, config.n_trials);

    let distribution: Array2<f64> = match config.mode {
        IscMode::LeaveOneOut => {
            let means = leave_one_out_means(&centered, config.tolerance);
            run_trials(&chain, config.parallel, centered.n_units(), |rng| {
                let flips = draw_flips(rng, n_subjects);
                leave_one_out_trial(&centered, &means, statistic, |subject, block| {
                    block.mapv(|v| v * flips[subject])
                })
            })
        }
        IscMode::Pairwise => run_trials(&chain, config.parallel, centered.n_units(), |rng| {
            let flips = draw_flips(rng, n_subjects);
            pairwise_trial(&centered, statistic, |subject, mut block| {
                let sign = flips[subject];
                block.mapv_inplace(|v| v * sign);
            })
        }),
    };

    NullDistribution::new(
        NullKind::SignFlip,
        observed,
        distribution,
        Some(chain.initial_seed()),
        config.side,
        config.p_value_method(),
    )
}
