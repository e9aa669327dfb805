//! Output of every null generator: observed statistic, null samples, and
//! the p-values derived from them.

use isc_test_core::{p_from_null_with, PValueMethod, Result, Side};
use ndarray::{Array1, Array2, ArrayView1};
use serde::Serialize;

use crate::kind::NullKind;

/// Per-unit percentile interval of a bootstrap distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub lower: Array1<f64>,
    pub upper: Array1<f64>,
    pub level: f64,
}

/// Observed statistic, sampled null, and the p-values derived from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NullDistribution {
    pub kind: NullKind,
    /// Summary statistic of the unrandomized data, one per unit.
    pub observed: Array1<f64>,
    pub p_values: Array1<f64>,
    /// (trials × units) null samples.
    pub distribution: Array2<f64>,
    /// Initial seed of the chain; pass it back to replay the run. `None`
    /// when the samples were enumerated rather than drawn.
    pub seed: Option<u64>,
    pub side: Side,
    pub method: PValueMethod,
    pub confidence_interval: Option<ConfidenceInterval>,
}

impl NullDistribution {
    /// Derives p-values for `observed` against `distribution`.
    ///
    /// # Errors
    /// Propagates the errors of [`p_from_null_with`].
    pub fn new(
        kind: NullKind,
        observed: Array1<f64>,
        distribution: Array2<f64>,
        seed: Option<u64>,
        side: Side,
        method: PValueMethod,
    ) -> Result<Self> {
        let p_values = p_from_null_with(observed.view(), distribution.view(), side, method, 0)?;
        Ok(Self {
            kind,
            observed,
            p_values,
            distribution,
            seed,
            side,
            method,
            confidence_interval: None,
        })
    }

    #[must_use]
    pub fn with_confidence_interval(mut self, interval: ConfidenceInterval) -> Self {
        self.confidence_interval = Some(interval);
        self
    }

    #[must_use]
    pub fn n_trials(&self) -> usize {
        self.distribution.nrows()
    }

    #[must_use]
    pub fn n_units(&self) -> usize {
        self.distribution.ncols()
    }

    /// Null samples for one unit.
    #[must_use]
    pub fn unit(&self, unit: usize) -> ArrayView1<'_, f64> {
        self.distribution.column(unit)
    }
}
