//! Inter-subject correlation engine.
//!
//! Two designs are supported:
//! - **Pairwise**: Pearson r for every unordered pair of subjects, ordered
//!   (0,1), (0,2), ..., (1,2), ... One row per pair.
//! - **Leave-one-out**: each subject against the NaN-masked mean of the other
//!   N-1 subjects. One row per subject.
//!
//! Values are returned as a (rows × units) array.

use std::fmt;
use std::str::FromStr;

use ndarray::{s, Array1, Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::correlation::pearson;
use crate::dataset::TimeSeriesDataset;
use crate::error::IscError;
use crate::masked::{masked_mean_excluding, NanTolerance};
use crate::summary::SummaryStatistic;

/// ISC design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IscMode {
    Pairwise,
    #[default]
    LeaveOneOut,
}

impl IscMode {
    #[must_use]
    pub fn from_pairwise(pairwise: bool) -> Self {
        if pairwise {
            Self::Pairwise
        } else {
            Self::LeaveOneOut
        }
    }

    #[must_use]
    pub fn is_pairwise(&self) -> bool {
        matches!(self, Self::Pairwise)
    }

    /// Number of ISC rows produced for `n_subjects`.
    #[must_use]
    pub fn n_rows(&self, n_subjects: usize) -> usize {
        match self {
            Self::Pairwise => n_subjects * n_subjects.saturating_sub(1) / 2,
            Self::LeaveOneOut => n_subjects,
        }
    }
}

impl fmt::Display for IscMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pairwise => f.write_str("pairwise"),
            Self::LeaveOneOut => f.write_str("leave-one-out"),
        }
    }
}

impl FromStr for IscMode {
    type Err = IscError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pairwise" => Ok(Self::Pairwise),
            "leave-one-out" | "loo" => Ok(Self::LeaveOneOut),
            _ => Err(IscError::InvalidValue(format!(
                "unknown ISC mode '{s}'. Valid modes: pairwise, leave-one-out"
            ))),
        }
    }
}

/// Options for [`isc`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IscOptions {
    pub mode: IscMode,
    /// `None` returns the raw per-subject or per-pair values.
    pub summary_statistic: Option<SummaryStatistic>,
    /// Applies to the leave-one-out mean only.
    pub tolerance: NanTolerance,
}

impl IscOptions {
    #[must_use]
    pub fn new(mode: IscMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_summary(mut self, statistic: SummaryStatistic) -> Self {
        self.summary_statistic = Some(statistic);
        self
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: NanTolerance) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Raw ISC values with the design that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct IscResult {
    mode: IscMode,
    n_subjects: usize,
    values: Array2<f64>,
}

impl IscResult {
    /// Wraps precomputed values, checking the row count against the design.
    ///
    /// # Errors
    /// Returns [`IscError::Shape`] if the row count does not match `mode`.
    pub fn new(mode: IscMode, n_subjects: usize, values: Array2<f64>) -> Result<Self, IscError> {
        let expected = mode.n_rows(n_subjects);
        if values.nrows() != expected {
            return Err(IscError::Shape(format!(
                "{mode} ISC for {n_subjects} subjects needs {expected} rows, got {}",
                values.nrows()
            )));
        }
        Ok(Self {
            mode,
            n_subjects,
            values,
        })
    }

    #[must_use]
    pub fn mode(&self) -> IscMode {
        self.mode
    }

    #[must_use]
    pub fn n_subjects(&self) -> usize {
        self.n_subjects
    }

    #[must_use]
    pub fn n_units(&self) -> usize {
        self.values.ncols()
    }

    /// (rows × units) values.
    #[must_use]
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    #[must_use]
    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    /// Subject pairs labelling each row, for pairwise results.
    #[must_use]
    pub fn pairs(&self) -> Option<Vec<(usize, usize)>> {
        self.mode
            .is_pairwise()
            .then(|| subject_pairs(self.n_subjects))
    }

    #[must_use]
    pub fn summarize(&self, statistic: SummaryStatistic) -> Array1<f64> {
        statistic.summarize(self.values.view())
    }
}

/// Unordered subject pairs in ascending (i, j) order.
#[must_use]
pub fn subject_pairs(n_subjects: usize) -> Vec<(usize, usize)> {
    (0..n_subjects)
        .flat_map(|i| ((i + 1)..n_subjects).map(move |j| (i, j)))
        .collect()
}

/// Row of pair (i, j), i != j, in the ordering of [`subject_pairs`].
#[must_use]
pub fn pair_index(i: usize, j: usize, n_subjects: usize) -> usize {
    let (i, j) = if i < j { (i, j) } else { (j, i) };
    i * n_subjects - i * (i + 1) / 2 + (j - i - 1)
}

/// Per-unit correlation between two (time point × unit) blocks.
#[must_use]
pub fn correlate_units(a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> Array1<f64> {
    a.axis_iter(Axis(1))
        .zip(b.axis_iter(Axis(1)))
        .map(|(x, y)| pearson(x, y))
        .collect()
}

/// For every subject, the masked mean of all other subjects.
///
/// Shape matches the dataset: slice `[.., .., s]` is the comparison series
/// for subject `s`.
#[must_use]
pub fn leave_one_out_means(dataset: &TimeSeriesDataset, tolerance: NanTolerance) -> Array3<f64> {
    let (n_time_points, n_units, n_subjects) = dataset.extents();
    let mut means = Array3::<f64>::zeros((n_time_points, n_units, n_subjects));
    for subject in 0..n_subjects {
        for unit in 0..n_units {
            let block = dataset.data().slice(s![.., unit, ..]);
            means
                .slice_mut(s![.., unit, subject])
                .assign(&masked_mean_excluding(block, Some(subject), tolerance));
        }
    }
    means
}

/// Pairwise ISC, (pairs × units).
#[must_use]
pub fn pairwise_isc(dataset: &TimeSeriesDataset) -> Array2<f64> {
    let pairs = subject_pairs(dataset.n_subjects());
    let mut values = Array2::<f64>::zeros((pairs.len(), dataset.n_units()));
    for (row, &(i, j)) in pairs.iter().enumerate() {
        values
            .row_mut(row)
            .assign(&correlate_units(dataset.subject(i), dataset.subject(j)));
    }
    values
}

/// Leave-one-out ISC, (subjects × units).
#[must_use]
pub fn leave_one_out_isc(dataset: &TimeSeriesDataset, tolerance: NanTolerance) -> Array2<f64> {
    let means = leave_one_out_means(dataset, tolerance);
    let mut values = Array2::<f64>::zeros((dataset.n_subjects(), dataset.n_units()));
    for subject in 0..dataset.n_subjects() {
        values.row_mut(subject).assign(&correlate_units(
            dataset.subject(subject),
            means.slice(s![.., .., subject]),
        ));
    }
    values
}

/// Units with degenerate correlations, out of a (rows × units) ISC matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NanUnitCounts {
    /// Units with at least one NaN row.
    pub partial: usize,
    /// Units where every row is NaN.
    pub empty: usize,
    /// Units with a correlation at exactly ±1, where `pearson` clamps.
    pub saturated: usize,
}

/// Counts units holding NaN or saturated correlations.
#[must_use]
pub fn nan_unit_counts(values: ArrayView2<'_, f64>) -> NanUnitCounts {
    values
        .axis_iter(Axis(1))
        .fold(NanUnitCounts::default(), |mut counts, unit| {
            let nans = unit.iter().filter(|v| v.is_nan()).count();
            if unit.iter().any(|v| v.abs() == 1.0) {
                counts.saturated += 1;
            }
            if nans > 0 {
                counts.partial += 1;
                if nans == unit.len() {
                    counts.empty += 1;
                }
            }
            counts
        })
}

/// Computes raw ISC values for the given design.
///
/// Logs a warning when any unit carries NaN or ±1 correlations, e.g. from
/// zero-variance series or NaN inputs beyond the tolerance.
#[must_use]
pub fn compute_isc(
    dataset: &TimeSeriesDataset,
    mode: IscMode,
    tolerance: NanTolerance,
) -> IscResult {
    let values = match mode {
        IscMode::Pairwise => pairwise_isc(dataset),
        IscMode::LeaveOneOut => leave_one_out_isc(dataset, tolerance),
    };

    let counts = nan_unit_counts(values.view());
    if counts.partial > 0 || counts.saturated > 0 {
        warn!(
            %mode,
            nan_units = counts.partial,
            empty_units = counts.empty,
            saturated_units = counts.saturated,
            n_units = values.ncols(),
            "ISC produced degenerate correlations"
        );
    }

    IscResult {
        mode,
        n_subjects: dataset.n_subjects(),
        values,
    }
}

/// Computes ISC values, summarized to a single row when a statistic is given.
///
/// Returns (rows × units) raw values, or (1 × units) when summarized.
#[must_use]
pub fn isc(dataset: &TimeSeriesDataset, options: &IscOptions) -> Array2<f64> {
    let result = compute_isc(dataset, options.mode, options.tolerance);
    match options.summary_statistic {
        Some(statistic) => result.summarize(statistic).insert_axis(Axis(0)),
        None => result.into_values(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const NAN: f64 = f64::NAN;

    fn three_subjects() -> TimeSeriesDataset {
        // time × subject, single unit
        TimeSeriesDataset::from_matrix(array![
            [1.0, 2.0, 1.0],
            [2.0, 1.0, 3.0],
            [3.0, 4.0, 2.0],
            [4.0, 3.0, 5.0],
            [5.0, 6.0, 4.0],
        ])
        .unwrap()
    }

    // ============================================================
    // Pair bookkeeping
    // ============================================================

    #[test]
    fn subject_pairs_are_ascending() {
        assert_eq!(
            subject_pairs(4),
            vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]
        );
        assert!(subject_pairs(1).is_empty());
    }

    #[test]
    fn pair_index_matches_enumeration() {
        let n = 7;
        for (row, (i, j)) in subject_pairs(n).into_iter().enumerate() {
            assert_eq!(pair_index(i, j, n), row);
            assert_eq!(pair_index(j, i, n), row);
        }
    }

    #[test]
    fn mode_parses_and_counts_rows() {
        assert_eq!("pairwise".parse::<IscMode>().unwrap(), IscMode::Pairwise);
        assert_eq!("loo".parse::<IscMode>().unwrap(), IscMode::LeaveOneOut);
        assert!("both".parse::<IscMode>().is_err());
        assert_eq!(IscMode::Pairwise.n_rows(5), 10);
        assert_eq!(IscMode::LeaveOneOut.n_rows(5), 5);
    }

    // ============================================================
    // Pairwise
    // ============================================================

    #[test]
    fn pairwise_matches_direct_correlation() {
        let dataset = three_subjects();

        let values = pairwise_isc(&dataset);

        assert_eq!(values.dim(), (3, 1));
        let expected = pearson(dataset.series(0, 1), dataset.series(0, 2));
        assert!((values[[2, 0]] - expected).abs() < 1e-12);
    }

    #[test]
    fn pairwise_ignores_tolerance_and_propagates_nan() {
        let dataset = TimeSeriesDataset::from_matrix(array![
            [1.0, 2.0, 1.0],
            [2.0, NAN, 3.0],
            [3.0, 4.0, 2.0],
            [4.0, 3.0, 5.0],
        ])
        .unwrap();

        let values = compute_isc(&dataset, IscMode::Pairwise, NanTolerance::Threshold(0.0));

        assert!(values.values()[[0, 0]].is_nan());
        assert!(!values.values()[[1, 0]].is_nan());
        assert!(values.values()[[2, 0]].is_nan());
    }

    // ============================================================
    // Leave-one-out
    // ============================================================

    #[test]
    fn leave_one_out_correlates_with_mean_of_others() {
        let dataset = three_subjects();

        let values = leave_one_out_isc(&dataset, NanTolerance::default());

        let others = array![1.5, 2.0, 3.0, 4.0, 5.0];
        let expected = pearson(dataset.series(0, 0), others.view());
        assert_eq!(values.dim(), (3, 1));
        assert!((values[[0, 0]] - expected).abs() < 1e-12);
    }

    #[test]
    fn leave_one_out_two_subjects_gives_identical_rows() {
        let dataset =
            TimeSeriesDataset::from_matrix(array![[1.0, 2.0], [2.0, 1.0], [3.0, 5.0]]).unwrap();

        let values = leave_one_out_isc(&dataset, NanTolerance::default());

        assert_eq!(values.dim(), (2, 1));
        assert!((values[[0, 0]] - values[[1, 0]]).abs() < 1e-12);
    }

    #[test]
    fn leave_one_out_strict_nan_among_others_is_nan() {
        let dataset = TimeSeriesDataset::from_matrix(array![
            [1.0, 2.0, 1.0],
            [2.0, NAN, 3.0],
            [3.0, 4.0, 2.0],
            [4.0, 3.0, 5.0],
        ])
        .unwrap();

        let strict = leave_one_out_isc(&dataset, NanTolerance::Strict);
        let tolerant = leave_one_out_isc(&dataset, NanTolerance::Threshold(0.0));

        assert!(strict[[0, 0]].is_nan());
        assert!(strict[[2, 0]].is_nan());
        assert!(!tolerant[[0, 0]].is_nan());
        assert!(!tolerant[[2, 0]].is_nan());
        // Subject 1's own series contains the NaN.
        assert!(tolerant[[1, 0]].is_nan());
    }

    // ============================================================
    // Entry point
    // ============================================================

    #[test]
    fn isc_summarizes_to_single_row() {
        let dataset = three_subjects();
        let options = IscOptions::new(IscMode::Pairwise).with_summary(SummaryStatistic::Mean);

        let summary = isc(&dataset, &options);
        let raw = isc(&dataset, &IscOptions::new(IscMode::Pairwise));

        assert_eq!(summary.dim(), (1, 1));
        assert_eq!(raw.dim(), (3, 1));
        let expected = SummaryStatistic::Mean.apply(raw.column(0).iter().copied());
        assert!((summary[[0, 0]] - expected).abs() < 1e-12);
    }

    #[test]
    fn isc_result_rejects_wrong_row_count() {
        let result = IscResult::new(IscMode::Pairwise, 4, Array2::zeros((4, 2)));

        assert!(matches!(result, Err(IscError::Shape(_))));
    }

    #[test]
    fn unit_counts_separate_nan_and_saturated_units() {
        let values = array![[0.2, NAN, NAN, 1.0], [0.4, 0.3, NAN, 0.5], [0.1, 0.2, NAN, -1.0]];

        let counts = nan_unit_counts(values.view());

        assert_eq!(
            counts,
            NanUnitCounts {
                partial: 2,
                empty: 1,
                saturated: 1
            }
        );
    }

    #[test]
    fn constant_subject_leaves_nan_pairs() {
        let dataset = TimeSeriesDataset::from_matrix(array![
            [1.0, 5.0, 2.0],
            [2.0, 5.0, 1.0],
            [3.0, 5.0, 4.0],
            [4.0, 5.0, 3.0],
        ])
        .unwrap();

        let result = compute_isc(&dataset, IscMode::Pairwise, NanTolerance::default());
        let counts = nan_unit_counts(result.values());

        // Pairs (0, 1) and (1, 2) involve the constant subject.
        assert_eq!(counts.partial, 1);
        assert_eq!(counts.empty, 0);
    }

    #[test]
    fn isc_result_reports_pairs() {
        let result = compute_isc(&three_subjects(), IscMode::Pairwise, NanTolerance::default());

        assert_eq!(result.pairs(), Some(vec![(0, 1), (0, 2), (1, 2)]));
        assert_eq!(result.n_units(), 1);
    }
}
