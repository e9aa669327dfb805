//! Pearson correlation primitive.

use ndarray::ArrayView1;

/// Calculates the Pearson correlation coefficient between two series.
///
/// Any NaN in either series, a length mismatch, fewer than two points, or a
/// zero-variance series yields NaN. The result is clamped to [-1, 1] so that
/// rounding cannot push it past the valid range.
#[must_use]
pub fn pearson(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return f64::NAN;
    }

    let n = x.len() as f64;
    let mean_x = x.sum() / n;
    let mean_y = y.sum() / n;
    if mean_x.is_nan() || mean_y.is_nan() {
        return f64::NAN;
    }

    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;

    for (xi, yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return f64::NAN;
    }

    (covariance / denominator).clamp(-1.0, 1.0)
}
