//! Phase randomization.
//!
//! A surrogate series keeps the amplitude spectrum of the original (and so
//! its autocorrelation) while every oscillatory component gets a fresh
//! uniform phase. One phase vector is drawn per subject and applied to all of
//! that subject's units, which keeps correlations between units intact.

use std::f64::consts::PI;
use std::sync::Arc;

use isc_test_core::isc::leave_one_out_means;
use isc_test_core::{compute_isc, IscMode, Result, TimeSeriesDataset};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::NullConfig;
use crate::kind::NullKind;
use crate::result::NullDistribution;
use crate::seed_chain::SeedChain;
use crate::trial::{leave_one_out_trial, pairwise_trial, run_trials};

/// Forward and inverse FFT plans for one series length.
#[derive(Clone)]
pub struct PhaseRandomizer {
    n_time_points: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for PhaseRandomizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseRandomizer")
            .field("n_time_points", &self.n_time_points)
            .finish_non_exhaustive()
    }
}

impl PhaseRandomizer {
    #[must_use]
    pub fn new(n_time_points: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            n_time_points,
            forward: planner.plan_fft_forward(n_time_points),
            inverse: planner.plan_fft_inverse(n_time_points),
        }
    }

    /// Number of bins that receive a random phase: every bin strictly between
    /// DC and Nyquist on the positive side.
    #[must_use]
    pub fn n_random_bins(&self) -> usize {
        self.n_time_points.saturating_sub(1) / 2
    }

    /// Uniform phases in [0, 2π), one per randomized bin.
    pub fn draw_phases<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        (0..self.n_random_bins())
            .map(|_| rng.gen::<f64>() * 2.0 * PI)
            .collect()
    }

    /// Complex spectrum of a real series.
    #[must_use]
    pub fn spectrum(&self, series: ArrayView1<'_, f64>) -> Vec<Complex<f64>> {
        let mut buffer: Vec<Complex<f64>> = series.iter().map(|&x| Complex::new(x, 0.0)).collect();
        self.forward.process(&mut buffer);
        buffer
    }

    /// Replaces the phase of each randomized bin, mirroring its conjugate so
    /// the inverse transform stays real. DC and Nyquist are left untouched.
    #[must_use]
    pub fn randomize_series(&self, series: ArrayView1<'_, f64>, phases: &[f64]) -> Array1<f64> {
        let n = self.n_time_points;
        let mut buffer = self.spectrum(series);

        for (bin, &phase) in (1..=self.n_random_bins()).zip(phases) {
            let magnitude = buffer[bin].norm();
            buffer[bin] = Complex::from_polar(magnitude, phase);
            buffer[n - bin] = buffer[bin].conj();
        }

        self.inverse.process(&mut buffer);
        buffer.iter().map(|c| c.re / n as f64).collect()
    }

    /// Applies the same phases to every unit of a (time point × unit) block.
    #[must_use]
    pub fn randomize_block(&self, block: ArrayView2<'_, f64>, phases: &[f64]) -> Array2<f64> {
        let mut randomized = Array2::<f64>::zeros(block.raw_dim());
        for (mut out, series) in randomized
            .axis_iter_mut(Axis(1))
            .zip(block.axis_iter(Axis(1)))
        {
            out.assign(&self.randomize_series(series, phases));
        }
        randomized
    }
}

/// Phase-randomization null distribution.
///
/// Pairwise randomizes every subject; leave-one-out randomizes the held-out
/// subject only, against the unrandomized mean of the others.
///
/// # Errors
/// Returns [`isc_test_core::IscError::InvalidConfig`] for an invalid
/// configuration.
pub fn phase_shift(dataset: &TimeSeriesDataset, config: &NullConfig) -> Result<NullDistribution> {
    config.validate()?;
    let statistic = config.summary_statistic;
    let (n_time_points, n_units, n_subjects) = dataset.extents();
    let randomizer = PhaseRandomizer::new(n_time_points);

    let observed = compute_isc(dataset, config.mode, config.tolerance).summarize(statistic);
    let chain = SeedChain::resolve(config.seed, config.n_trials);

    let draw_all = |rng: &mut rand_chacha::ChaCha8Rng| -> Vec<Vec<f64>> {
        (0..n_subjects).map(|_| randomizer.draw_phases(rng)).collect()
    };

    let distribution = match config.mode {
        IscMode::LeaveOneOut => {
            let means = leave_one_out_means(dataset, config.tolerance);
            run_trials(&chain, config.parallel, n_units, |rng| {
                let phases = draw_all(rng);
                leave_one_out_trial(dataset, &means, statistic, |subject, block| {
                    randomizer.randomize_block(block, &phases[subject])
                })
            })
        }
        IscMode::Pairwise => run_trials(&chain, config.parallel, n_units, |rng| {
            let phases = draw_all(rng);
            pairwise_trial(dataset, statistic, |subject, mut block| {
                let randomized = randomizer.randomize_block(block.view(), &phases[subject]);
                block.assign(&randomized);
            })
        }),
    };

    NullDistribution::new(
        NullKind::PhaseShift,
        observed,
        distribution,
        Some(chain.initial_seed()),
        config.side,
        config.p_value_method(),
    )
}
