//! Evaluation metrics for regression models.

use serde::{Deserialize, Serialize};

/// Holdout metrics reported after training.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Coefficient of determination.
    pub r2: f64,
    /// Mean absolute error in target units.
    pub mae: f64,
    /// Number of rows the metrics were computed on.
    pub support: usize,
}

impl RegressionMetrics {
    /// Compute metrics for aligned truth/prediction slices.
    pub fn compute(truth: &[f64], predicted: &[f64]) -> Self {
        Self {
            r2: r2_score(truth, predicted),
            mae: mean_absolute_error(truth, predicted),
            support: truth.len().min(predicted.len()),
        }
    }
}

/// `1 - SS_res / SS_tot`.
///
/// A constant truth vector has no variance to explain: a perfect fit scores
/// 1.0 and anything else 0.0.
pub fn r2_score(truth: &[f64], predicted: &[f64]) -> f64 {
    let n = truth.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    let mean = truth[..n].iter().sum::<f64>() / n as f64;
    let mut ss_res = 0.0f64;
    let mut ss_tot = 0.0f64;
    for (t, p) in truth.iter().zip(predicted) {
        ss_res += (t - p).powi(2);
        ss_tot += (t - mean).powi(2);
    }
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn mean_absolute_error(truth: &[f64], predicted: &[f64]) -> f64 {
    let n = truth.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions_score_one() {
        let truth = [1.0, 2.0, 3.0];
        assert_eq!(r2_score(&truth, &truth), 1.0);
        assert_eq!(mean_absolute_error(&truth, &truth), 0.0);
    }

    #[test]
    fn mean_predictor_scores_zero() {
        let truth = [1.0, 2.0, 3.0];
        let predicted = [2.0, 2.0, 2.0];
        assert!(r2_score(&truth, &predicted).abs() < 1e-12);
        assert!((mean_absolute_error(&truth, &predicted) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn worse_than_mean_is_negative() {
        let truth = [1.0, 2.0, 3.0];
        let predicted = [3.0, 2.0, 1.0];
        assert!((r2_score(&truth, &predicted) + 3.0).abs() < 1e-12);
    }

    #[test]
    fn constant_truth_is_handled() {
        assert_eq!(r2_score(&[4.0, 4.0], &[4.0, 4.0]), 1.0);
        assert_eq!(r2_score(&[4.0, 4.0], &[3.0, 4.0]), 0.0);
        let metrics = RegressionMetrics::compute(&[4.0, 4.0], &[3.0, 4.0]);
        assert_eq!(metrics.support, 2);
        assert_eq!(metrics.mae, 0.5);
    }
}
