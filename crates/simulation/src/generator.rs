//! Compound-symmetric Gaussian data.
//!
//! Every subject has variance `var` and every pair of subjects covariance
//! `r`, so `r / var` is the true inter-subject correlation. Sampling uses the
//! closed form of that covariance instead of a Cholesky factor:
//!
//! - `r >= 0`: `x = mean + sqrt(r) * z + sqrt(var - r) * e`, with `z` shared by
//!   all subjects at a time point.
//! - `r < 0`: `x = mean + sqrt(var - r) * (e - g * mean(e))`, where
//!   `g = 1 - sqrt(1 - q)` and `q = -r * N / (var - r)`.
//!
//! `z` and `e` are independent standard normals.

use isc_test_core::dataset::MIN_SUBJECTS;
use isc_test_core::{IscError, Result, TimeSeriesDataset};
use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

/// Samples a (time point × subject) matrix with compound-symmetric covariance.
///
/// # Errors
/// Returns [`IscError::InvalidConfig`] if there are no time points, fewer
/// than two subjects, `var` is not positive, or `r` lies outside
/// `[-var / (N - 1), var]`, where the covariance stops being positive
/// semi-definite.
pub fn correlated_data(
    n_time_points: usize,
    n_subjects: usize,
    r: f64,
    mean: f64,
    var: f64,
    seed: u64,
) -> Result<Array2<f64>> {
    if n_time_points == 0 {
        return Err(IscError::InvalidConfig(
            "need at least one time point".to_string(),
        ));
    }
    if n_subjects < MIN_SUBJECTS {
        return Err(IscError::InvalidConfig(format!(
            "need at least {MIN_SUBJECTS} subjects, got {n_subjects}"
        )));
    }
    if !(var > 0.0) {
        return Err(IscError::InvalidConfig(format!(
            "variance must be positive, got {var}"
        )));
    }
    let lower = -var / (n_subjects - 1) as f64;
    if !(lower..=var).contains(&r) {
        return Err(IscError::InvalidConfig(format!(
            "covariance {r} outside [{lower}, {var}] for {n_subjects} subjects"
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let unique = var - r;
    let mut data = Array2::<f64>::zeros((n_time_points, n_subjects));

    if r >= 0.0 {
        let (shared_sd, unique_sd) = (r.sqrt(), unique.sqrt());
        for mut row in data.rows_mut() {
            let shared: f64 = StandardNormal.sample(&mut rng);
            for value in row.iter_mut() {
                let noise: f64 = StandardNormal.sample(&mut rng);
                *value = mean + shared_sd * shared + unique_sd * noise;
            }
        }
    } else {
        let q = -r * n_subjects as f64 / unique;
        let shrink = 1.0 - (1.0 - q).max(0.0).sqrt();
        let unique_sd = unique.sqrt();
        for mut row in data.rows_mut() {
            for value in row.iter_mut() {
                *value = StandardNormal.sample(&mut rng);
            }
            let row_mean = row.sum() / n_subjects as f64;
            row.mapv_inplace(|e| mean + unique_sd * (e - shrink * row_mean));
        }
    }

    Ok(data)
}

/// [`correlated_data`] wrapped as a single-unit dataset.
///
/// # Errors
/// Same conditions as [`correlated_data`].
pub fn correlated_dataset(
    n_time_points: usize,
    n_subjects: usize,
    r: f64,
    seed: u64,
) -> Result<TimeSeriesDataset> {
    let data = correlated_data(n_time_points, n_subjects, r, 0.0, 1.0, seed)?;
    TimeSeriesDataset::from_matrix(data)
}
