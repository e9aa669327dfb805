//! Validation and normalization of multi-subject time-series input.
//!
//! Every entry point in the workspace takes a [`TimeSeriesDataset`], a 3-D
//! array with axes (time point, unit, subject). Missing cells are NaN.

use ndarray::{s, Array2, Array3, ArrayView1, ArrayView2, ArrayViewMut2, Axis};

use crate::error::{IscError, Result};

/// Minimum number of subjects for either ISC design.
pub const MIN_SUBJECTS: usize = 2;

/// Canonical multi-subject time-series container.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesDataset {
    data: Array3<f64>,
}

impl TimeSeriesDataset {
    /// Wraps a (time point × unit × subject) array after checking its extents.
    ///
    /// # Errors
    /// Returns [`IscError::Shape`] if there are fewer than two subjects or if
    /// the time or unit axis is empty.
    pub fn from_array(data: Array3<f64>) -> Result<Self> {
        let (n_time_points, n_units, n_subjects) = data.dim();
        if n_subjects < MIN_SUBJECTS {
            return Err(IscError::Shape(format!(
                "need at least {MIN_SUBJECTS} subjects, got {n_subjects}"
            )));
        }
        if n_time_points == 0 || n_units == 0 {
            return Err(IscError::Shape(format!(
                "empty time or unit axis: {n_time_points} time points x {n_units} units"
            )));
        }
        Ok(Self { data })
    }

    /// Stacks per-subject (time point × unit) arrays along a new subject axis.
    ///
    /// # Errors
    /// Returns [`IscError::Shape`] if any two subjects disagree in shape, or
    /// if the stacked array fails [`Self::from_array`].
    pub fn from_subjects(subjects: &[Array2<f64>]) -> Result<Self> {
        let first = subjects.first().ok_or_else(|| {
            IscError::Shape(format!("need at least {MIN_SUBJECTS} subjects, got 0"))
        })?;
        let (n_time_points, n_units) = first.dim();

        for (index, subject) in subjects.iter().enumerate().skip(1) {
            if subject.dim() != (n_time_points, n_units) {
                return Err(IscError::Shape(format!(
                    "subject {index} has shape {:?}, expected {:?}",
                    subject.dim(),
                    (n_time_points, n_units)
                )));
            }
        }

        let mut data = Array3::<f64>::zeros((n_time_points, n_units, subjects.len()));
        for (index, subject) in subjects.iter().enumerate() {
            data.slice_mut(s![.., .., index]).assign(subject);
        }
        Self::from_array(data)
    }

    /// Treats a (time point × subject) matrix as a single-unit dataset.
    ///
    /// # Errors
    /// Same conditions as [`Self::from_array`].
    pub fn from_matrix(matrix: Array2<f64>) -> Result<Self> {
        Self::from_array(matrix.insert_axis(Axis(1)))
    }

    #[must_use]
    pub fn n_time_points(&self) -> usize {
        self.data.dim().0
    }

    #[must_use]
    pub fn n_units(&self) -> usize {
        self.data.dim().1
    }

    #[must_use]
    pub fn n_subjects(&self) -> usize {
        self.data.dim().2
    }

    /// Returns (time points, units, subjects).
    #[must_use]
    pub fn extents(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Borrows the underlying array.
    #[must_use]
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// One subject's series at one unit.
    #[must_use]
    pub fn series(&self, unit: usize, subject: usize) -> ArrayView1<'_, f64> {
        self.data.slice(s![.., unit, subject])
    }

    /// One subject's (time point × unit) block.
    #[must_use]
    pub fn subject(&self, subject: usize) -> ArrayView2<'_, f64> {
        self.data.slice(s![.., .., subject])
    }

    /// Returns a copy where each subject's series is centered over time.
    ///
    /// The mean skips NaN cells; NaN cells stay NaN.
    #[must_use]
    pub fn mean_centered(&self) -> Self {
        let mut data = self.data.clone();
        for mut lane in data.lanes_mut(Axis(0)) {
            let (sum, count) = lane
                .iter()
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
            if count == 0 {
                continue;
            }
            let mean = sum / count as f64;
            lane.mapv_inplace(|v| v - mean);
        }
        Self { data }
    }

    /// Returns a copy with each subject's (time point × unit) block rewritten
    /// in place by `transform`. Extents never change, so no re-validation.
    #[must_use]
    pub fn map_subjects<F>(&self, mut transform: F) -> Self
    where
        F: FnMut(usize, ArrayViewMut2<'_, f64>),
    {
        let mut data = self.data.clone();
        for (subject, block) in data.axis_iter_mut(Axis(2)).enumerate() {
            transform(subject, block);
        }
        Self { data }
    }
}

impl TryFrom<Array3<f64>> for TimeSeriesDataset {
    type Error = IscError;

    fn try_from(data: Array3<f64>) -> Result<Self> {
        Self::from_array(data)
    }
}
