//! Subject-label permutation on computed ISC values.
//!
//! With one group the null is built by flipping the sign of each subject's
//! contribution: a leave-one-out value takes its subject's sign, a pairwise
//! value the product of both subjects' signs. With two groups the statistic
//! is `summary(A) - summary(B)` and the null shuffles the group labels.

use isc_test_core::{
    compute_isc, IscError, IscMode, IscResult, PValueMethod, Result, TimeSeriesDataset,
};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::seq::SliceRandom;
use tracing::debug;

use crate::config::NullConfig;
use crate::kind::NullKind;
use crate::result::NullDistribution;
use crate::seed_chain::SeedChain;
use crate::signflip::draw_flips;
use crate::trial::run_trials;

/// Largest subject count for which sign patterns are enumerated.
const MAX_ENUMERATED_SUBJECTS: usize = 30;

/// Group labels accepted in [`NullConfig::groups`].
const GROUP_A: usize = 0;
const GROUP_B: usize = 1;

/// Permutation null distribution computed from the dataset.
///
/// For two-group leave-one-out designs each subject is compared with the
/// mean of its own group.
///
/// # Errors
/// Returns [`IscError::InvalidConfig`] for an invalid configuration, and
/// [`IscError::Shape`] or [`IscError::InvalidValue`] for malformed groups.
pub fn permutation(dataset: &TimeSeriesDataset, config: &NullConfig) -> Result<NullDistribution> {
    config.validate()?;
    let iscs = match (&config.groups, config.mode) {
        (Some(groups), IscMode::LeaveOneOut) => within_group_leave_one_out(dataset, groups, config)?,
        _ => compute_isc(dataset, config.mode, config.tolerance),
    };
    permutation_from_iscs(&iscs, config)
}

/// Permutation null distribution from precomputed ISC values.
///
/// The design is taken from `iscs`, not from `config.mode`.
///
/// # Errors
/// Same conditions as [`permutation`].
pub fn permutation_from_iscs(iscs: &IscResult, config: &NullConfig) -> Result<NullDistribution> {
    config.validate()?;
    match &config.groups {
        Some(groups) => two_group(iscs, groups, config),
        None => one_group(iscs, config),
    }
}

fn one_group(iscs: &IscResult, config: &NullConfig) -> Result<NullDistribution> {
    let statistic = config.summary_statistic;
    let n_subjects = iscs.n_subjects();
    let values = iscs.values();
    let pairs = iscs.pairs();
    let observed = iscs.summarize(statistic);

    let flipped_summary =
        |flips: &[f64]| statistic.summarize(flip_values(values, pairs.as_deref(), flips).view());

    if let Some(n_patterns) = enumerable_patterns(config, n_subjects) {
        debug!(n_subjects, n_patterns, "enumerating every sign pattern");
        let mut distribution = Array2::<f64>::zeros((n_patterns, iscs.n_units()));
        for (pattern, mut row) in distribution.rows_mut().into_iter().enumerate() {
            let flips: Vec<f64> = (0..n_subjects)
                .map(|subject| if (pattern >> subject) & 1 == 1 { -1.0 } else { 1.0 })
                .collect();
            row.assign(&flipped_summary(&flips));
        }
        let method = if config.exact {
            PValueMethod::Enumerated
        } else {
            PValueMethod::NormalApproximation
        };
        return NullDistribution::new(
            NullKind::Permutation,
            observed,
            distribution,
            None,
            config.side,
            method,
        );
    }

    let chain = SeedChain::resolve(config.seed, config.n_trials);
    let distribution = run_trials(&chain, config.parallel, iscs.n_units(), |rng| {
        flipped_summary(&draw_flips(rng, n_subjects))
    });

    NullDistribution::new(
        NullKind::Permutation,
        observed,
        distribution,
        Some(chain.initial_seed()),
        config.side,
        config.p_value_method(),
    )
}

fn enumerable_patterns(config: &NullConfig, n_subjects: usize) -> Option<usize> {
    if !config.exhaustive_permutations || n_subjects > MAX_ENUMERATED_SUBJECTS {
        return None;
    }
    let n_patterns = 1usize << n_subjects;
    (n_patterns <= config.n_trials).then_some(n_patterns)
}

/// Multiplies each row by its subject sign, or by the product of both signs
/// for pairwise rows.
fn flip_values(
    values: ArrayView2<'_, f64>,
    pairs: Option<&[(usize, usize)]>,
    flips: &[f64],
) -> Array2<f64> {
    let mut flipped = values.to_owned();
    for (row_index, mut row) in flipped.rows_mut().into_iter().enumerate() {
        let sign = match pairs {
            Some(pairs) => {
                let (i, j) = pairs[row_index];
                flips[i] * flips[j]
            }
            None => flips[row_index],
        };
        row.mapv_inplace(|v| v * sign);
    }
    flipped
}

fn two_group(iscs: &IscResult, groups: &[usize], config: &NullConfig) -> Result<NullDistribution> {
    validate_groups(groups, iscs.n_subjects())?;
    let statistic = config.summary_statistic;
    let values = iscs.values();
    let pairs = iscs.pairs();

    let difference = |labels: &[usize]| -> Array1<f64> {
        let a = group_rows(values, pairs.as_deref(), labels, GROUP_A);
        let b = group_rows(values, pairs.as_deref(), labels, GROUP_B);
        &statistic.summarize(a.view()) - &statistic.summarize(b.view())
    };

    let observed = difference(groups);
    let chain = SeedChain::resolve(config.seed, config.n_trials);
    let distribution = run_trials(&chain, config.parallel, iscs.n_units(), |rng| {
        let mut labels = groups.to_vec();
        labels.shuffle(rng);
        difference(&labels)
    });

    NullDistribution::new(
        NullKind::Permutation,
        observed,
        distribution,
        Some(chain.initial_seed()),
        config.side,
        config.p_value_method(),
    )
}

/// Rows belonging to `group`: its subjects, or pairs with both members in it.
fn group_rows(
    values: ArrayView2<'_, f64>,
    pairs: Option<&[(usize, usize)]>,
    labels: &[usize],
    group: usize,
) -> Array2<f64> {
    let rows: Vec<usize> = match pairs {
        Some(pairs) => pairs
            .iter()
            .enumerate()
            .filter(|(_, pair)| labels[pair.0] == group && labels[pair.1] == group)
            .map(|(row, _)| row)
            .collect(),
        None => (0..labels.len()).filter(|&s| labels[s] == group).collect(),
    };
    values.select(Axis(0), &rows)
}

fn validate_groups(groups: &[usize], n_subjects: usize) -> Result<()> {
    if groups.len() != n_subjects {
        return Err(IscError::Shape(format!(
            "{} group labels for {n_subjects} subjects",
            groups.len()
        )));
    }
    if let Some(label) = groups.iter().find(|&&g| g != GROUP_A && g != GROUP_B) {
        return Err(IscError::InvalidValue(format!(
            "group labels must be {GROUP_A} or {GROUP_B}, got {label}"
        )));
    }
    for group in [GROUP_A, GROUP_B] {
        let size = groups.iter().filter(|&&g| g == group).count();
        if size < 2 {
            return Err(IscError::InvalidConfig(format!(
                "group {group} needs at least 2 subjects, got {size}"
            )));
        }
    }
    Ok(())
}

/// Leave-one-out ISC where each subject is compared with its own group.
fn within_group_leave_one_out(
    dataset: &TimeSeriesDataset,
    groups: &[usize],
    config: &NullConfig,
) -> Result<IscResult> {
    validate_groups(groups, dataset.n_subjects())?;
    let mut values = Array2::<f64>::zeros((dataset.n_subjects(), dataset.n_units()));
    for group in [GROUP_A, GROUP_B] {
        let members: Vec<usize> = (0..groups.len()).filter(|&s| groups[s] == group).collect();
        let subset = TimeSeriesDataset::from_array(dataset.data().select(Axis(2), &members))?;
        let subset_values = compute_isc(&subset, IscMode::LeaveOneOut, config.tolerance);
        for (row, &subject) in members.iter().enumerate() {
            values
                .row_mut(subject)
                .assign(&subset_values.values().row(row));
        }
    }
    IscResult::new(IscMode::LeaveOneOut, dataset.n_subjects(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use isc_test_core::{NanTolerance, SummaryStatistic};
    use ndarray::{array, Array3};

    fn loo_values(values: Array2<f64>) -> IscResult {
        let n = values.nrows();
        IscResult::new(IscMode::LeaveOneOut, n, values).unwrap()
    }

    // ============================================================
    // One group
    // ============================================================

    #[test]
    fn flip_values_uses_pair_sign_product() {
        let values = array![[0.5], [0.4], [0.3]];
        let pairs = [(0, 1), (0, 2), (1, 2)];

        let flipped = flip_values(values.view(), Some(&pairs), &[1.0, -1.0, -1.0]);

        assert_eq!(flipped, array![[-0.5], [-0.4], [0.3]]);
    }

    #[test]
    fn exhaustive_enumerates_every_pattern() {
        let iscs = loo_values(array![[0.2], [0.3], [0.4]]);
        let config = NullConfig::new(IscMode::LeaveOneOut, 100)
            .with_summary(SummaryStatistic::Mean)
            .with_seed(5)
            .with_exhaustive_permutations(true);

        let null = permutation_from_iscs(&iscs, &config).unwrap();

        assert_eq!(null.n_trials(), 8);
        assert_eq!(null.method, PValueMethod::Enumerated);
        assert_eq!(null.seed, None);
        // Null is symmetric about zero: every pattern has its mirror.
        let total: f64 = null.distribution.column(0).sum();
        assert!(total.abs() < 1e-12);
        // All positive values are the single most extreme pattern (and its mirror).
        assert!((null.p_values[0] - 2.0 / 8.0).abs() < 1e-12);
    }

    #[test]
    fn exhaustive_falls_back_when_patterns_exceed_trials() {
        let iscs = loo_values(Array2::from_elem((8, 1), 0.1));
        let config = NullConfig::new(IscMode::LeaveOneOut, 100)
            .with_seed(1)
            .with_exhaustive_permutations(true);

        let null = permutation_from_iscs(&iscs, &config).unwrap();

        assert_eq!(null.n_trials(), 100);
        assert_eq!(null.method, PValueMethod::MonteCarlo);
        assert_eq!(null.seed, Some(1));
    }

    #[test]
    fn random_flips_are_reproducible() {
        let iscs = loo_values(array![[0.2, -0.1], [0.3, 0.0], [0.4, 0.1], [0.1, 0.2]]);
        let config = NullConfig::new(IscMode::LeaveOneOut, 64).with_seed(21);

        let first = permutation_from_iscs(&iscs, &config).unwrap();
        let second = permutation_from_iscs(&iscs, &config.clone().with_parallel(false)).unwrap();

        assert_eq!(first.distribution, second.distribution);
        assert_eq!(first.seed, Some(21));
    }

    #[test]
    fn pairwise_permutation_from_dataset() {
        let data = Array3::from_shape_fn((50, 1, 10), |(t, _, s)| {
            let t = t as f64;
            (t * 0.5).sin() + 0.3 * (t * (s as f64 + 0.7)).cos()
        });
        let dataset = TimeSeriesDataset::from_array(data).unwrap();
        let config = NullConfig::new(IscMode::Pairwise, 200)
            .with_seed(4)
            .with_summary(SummaryStatistic::Mean);

        let null = permutation(&dataset, &config).unwrap();

        assert_eq!(null.distribution.dim(), (200, 1));
        assert!(null.observed[0] > 0.0);
        assert!(null.p_values[0] < 0.05, "p was {}", null.p_values[0]);
    }

    // ============================================================
    // Two groups
    // ============================================================

    #[test]
    fn two_group_observed_is_difference_of_summaries() {
        let iscs = loo_values(array![[0.8], [0.7], [0.1], [0.2]]);
        let config = NullConfig::new(IscMode::LeaveOneOut, 50)
            .with_seed(2)
            .with_groups(vec![0, 0, 1, 1]);

        let null = permutation_from_iscs(&iscs, &config).unwrap();

        assert!((null.observed[0] - 0.6).abs() < 1e-12);
        assert_eq!(null.n_trials(), 50);
    }

    #[test]
    fn two_group_pairwise_uses_within_group_pairs() {
        // Pairs: (0,1) (0,2) (0,3) (1,2) (1,3) (2,3)
        let iscs = IscResult::new(
            IscMode::Pairwise,
            4,
            array![[0.9], [0.0], [0.0], [0.0], [0.0], [0.3]],
        )
        .unwrap();
        let config = NullConfig::new(IscMode::Pairwise, 10)
            .with_seed(2)
            .with_groups(vec![0, 0, 1, 1]);

        let null = permutation_from_iscs(&iscs, &config).unwrap();

        assert!((null.observed[0] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn groups_are_validated() {
        let iscs = loo_values(array![[0.8], [0.7], [0.1], [0.2]]);
        let base = NullConfig::new(IscMode::LeaveOneOut, 10);

        let wrong_length = permutation_from_iscs(&iscs, &base.clone().with_groups(vec![0, 1]));
        let bad_label = permutation_from_iscs(&iscs, &base.clone().with_groups(vec![0, 0, 2, 1]));
        let tiny_group = permutation_from_iscs(&iscs, &base.with_groups(vec![0, 0, 0, 1]));

        assert!(matches!(wrong_length, Err(IscError::Shape(_))));
        assert!(matches!(bad_label, Err(IscError::InvalidValue(_))));
        assert!(matches!(tiny_group, Err(IscError::InvalidConfig(_))));
    }

    #[test]
    fn two_group_leave_one_out_compares_within_group() {
        let data = Array3::from_shape_fn((30, 1, 4), |(t, _, s)| {
            let t = t as f64;
            if s < 2 {
                (t * 0.4).sin() + 0.05 * s as f64 * t.cos()
            } else {
                (t * 1.1).cos() + 0.05 * s as f64 * t.sin()
            }
        });
        let dataset = TimeSeriesDataset::from_array(data).unwrap();
        let groups = vec![0, 0, 1, 1];
        let config = NullConfig::new(IscMode::LeaveOneOut, 10).with_groups(groups.clone());

        let within = within_group_leave_one_out(&dataset, &groups, &config).unwrap();
        let pooled = compute_isc(&dataset, IscMode::LeaveOneOut, NanTolerance::default());

        assert!(within.values()[[0, 0]] > pooled.values()[[0, 0]]);
    }
}
