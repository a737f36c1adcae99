//! Regression metrics over `(n_samples, n_outputs)` matrices.
//!
//! Multi-output scores are the uniform average of the per-column scores.

use ndarray::{ArrayView1, ArrayView2, Axis};

/// Metrics for evaluating regression models.
pub struct Metrics;

impl Metrics {
    /// Mean Squared Error, averaged over all outputs.
    ///
    /// # Panics
    ///
    /// Panics if the shapes of `y_true` and `y_pred` differ.
    pub fn mse(y_true: ArrayView2<'_, f64>, y_pred: ArrayView2<'_, f64>) -> f64 {
        assert_eq!(y_true.dim(), y_pred.dim(), "Arrays must have the same shape");
        if y_true.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(&t, &p)| (t - p).powi(2))
            .sum();
        sum_sq / y_true.len() as f64
    }

    /// Root Mean Squared Error, in target units.
    pub fn rmse(y_true: ArrayView2<'_, f64>, y_pred: ArrayView2<'_, f64>) -> f64 {
        Self::mse(y_true, y_pred).sqrt()
    }

    /// Mean Absolute Error, averaged over all outputs.
    pub fn mae(y_true: ArrayView2<'_, f64>, y_pred: ArrayView2<'_, f64>) -> f64 {
        assert_eq!(y_true.dim(), y_pred.dim(), "Arrays must have the same shape");
        if y_true.is_empty() {
            return 0.0;
        }
        let sum_abs: f64 = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(&t, &p)| (t - p).abs())
            .sum();
        sum_abs / y_true.len() as f64
    }

    /// R² (coefficient of determination), uniform average over outputs.
    ///
    /// R² = 1 - (SS_res / SS_tot)
    ///
    /// A constant target column scores 1.0 when predicted exactly and 0.0 otherwise.
    pub fn r2(y_true: ArrayView2<'_, f64>, y_pred: ArrayView2<'_, f64>) -> f64 {
        assert_eq!(y_true.dim(), y_pred.dim(), "Arrays must have the same shape");
        let k = y_true.ncols();
        if k == 0 || y_true.nrows() == 0 {
            return 0.0;
        }
        let total: f64 = y_true
            .axis_iter(Axis(1))
            .zip(y_pred.axis_iter(Axis(1)))
            .map(|(t, p)| r2_column(t, p))
            .sum();
        total / k as f64
    }
}

fn r2_column(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|&t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
