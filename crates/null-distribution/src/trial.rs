//! Trial execution shared by the generators.

use isc_test_core::isc::{correlate_units, pairwise_isc};
use isc_test_core::{SummaryStatistic, TimeSeriesDataset};
use ndarray::{s, Array1, Array2, Array3, ArrayView2, ArrayViewMut2};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::seed_chain::SeedChain;

/// Runs one trial per chained seed and stacks the rows as (trials × units).
///
/// Rows come back in chain order whether or not the trials run on the rayon
/// pool, so the output is identical either way.
pub fn run_trials<F>(chain: &SeedChain, parallel: bool, n_units: usize, trial: F) -> Array2<f64>
where
    F: Fn(&mut ChaCha8Rng) -> Array1<f64> + Sync,
{
    let run = |&seed: &u64| trial(&mut SeedChain::trial_rng(seed));
    let rows: Vec<Array1<f64>> = if parallel {
        chain.seeds().par_iter().map(run).collect()
    } else {
        chain.seeds().iter().map(run).collect()
    };

    let mut distribution = Array2::from_elem((rows.len(), n_units), f64::NAN);
    for (mut row, values) in distribution.rows_mut().into_iter().zip(rows) {
        row.assign(&values);
    }
    distribution
}

/// Summary of leave-one-out ISC where only the held-out subject is
/// transformed.
///
/// `means` holds the precomputed masked mean of the other subjects for every
/// subject; `transform` receives the subject index and its untouched
/// (time point × unit) block.
pub(crate) fn leave_one_out_trial<F>(
    dataset: &TimeSeriesDataset,
    means: &Array3<f64>,
    statistic: SummaryStatistic,
    mut transform: F,
) -> Array1<f64>
where
    F: FnMut(usize, ArrayView2<'_, f64>) -> Array2<f64>,
{
    let mut values = Array2::<f64>::zeros((dataset.n_subjects(), dataset.n_units()));
    for subject in 0..dataset.n_subjects() {
        let transformed = transform(subject, dataset.subject(subject));
        values.row_mut(subject).assign(&correlate_units(
            transformed.view(),
            means.slice(s![.., .., subject]),
        ));
    }
    statistic.summarize(values.view())
}

/// Summary of pairwise ISC after every subject has been transformed in place.
pub(crate) fn pairwise_trial<F>(
    dataset: &TimeSeriesDataset,
    statistic: SummaryStatistic,
    transform: F,
) -> Array1<f64>
where
    F: FnMut(usize, ArrayViewMut2<'_, f64>),
{
    let transformed = dataset.map_subjects(transform);
    statistic.summarize(pairwise_isc(&transformed).view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use isc_test_core::isc::leave_one_out_means;
    use isc_test_core::NanTolerance;
    use ndarray::array;
    use rand::Rng;

    fn dataset() -> TimeSeriesDataset {
        TimeSeriesDataset::from_matrix(array![
            [1.0, 2.0, 1.0],
            [2.0, 1.0, 3.0],
            [3.0, 4.0, 2.0],
            [4.0, 3.0, 5.0],
            [5.0, 6.0, 4.0],
        ])
        .unwrap()
    }

    #[test]
    fn run_trials_keeps_chain_order() {
        let chain = SeedChain::new(5, 64);
        let draw = |rng: &mut ChaCha8Rng| Array1::from_elem(2, rng.gen::<f64>());

        let sequential = run_trials(&chain, false, 2, draw);
        let parallel = run_trials(&chain, true, 2, draw);

        assert_eq!(sequential.dim(), (64, 2));
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn identity_transform_reproduces_observed_isc() {
        let dataset = dataset();
        let means = leave_one_out_means(&dataset, NanTolerance::default());
        let observed = SummaryStatistic::Median.summarize(
            isc_test_core::isc::leave_one_out_isc(&dataset, NanTolerance::default()).view(),
        );

        let trial = leave_one_out_trial(&dataset, &means, SummaryStatistic::Median, |_, block| {
            block.to_owned()
        });

        assert!((trial[0] - observed[0]).abs() < 1e-12);
    }

    #[test]
    fn pairwise_trial_sees_transformed_subjects() {
        let dataset = dataset();

        let negated = pairwise_trial(&dataset, SummaryStatistic::Mean, |subject, mut block| {
            if subject == 0 {
                block.mapv_inplace(|v| -v);
            }
        });
        let plain = pairwise_trial(&dataset, SummaryStatistic::Mean, |_, _| {});

        assert!((negated[0] - plain[0]).abs() > 1e-6);
    }
}
