use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Guard for near-zero denominators (MAPE, F1).
pub const METRIC_EPSILON: f64 = 1e-12;

/// Error metrics for a continuous forecast.
///
/// `r2` is `None` when the true values have zero variance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    /// Mean absolute percentage error, in percent.
    pub mape: f64,
    pub r2: Option<f64>,
}

impl RegressionMetrics {
    /// Compute metrics for paired true/predicted values.
    ///
    /// Empty input yields NaN errors and an undefined R².
    pub fn calculate(y_true: &[f64], y_pred: &[f64]) -> Self {
        let n = y_true.len().min(y_pred.len());
        if n == 0 {
            return Self {
                mae: f64::NAN,
                mse: f64::NAN,
                rmse: f64::NAN,
                mape: f64::NAN,
                r2: None,
            };
        }
        let n_f = n as f64;

        let mut abs_sum = 0.0;
        let mut sq_sum = 0.0;
        let mut pct_sum = 0.0;
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            let diff = t - p;
            abs_sum += diff.abs();
            sq_sum += diff * diff;
            pct_sum += diff.abs() / t.abs().max(METRIC_EPSILON);
        }

        let mae = abs_sum / n_f;
        let mse = sq_sum / n_f;
        let mean_y = y_true[..n].iter().sum::<f64>() / n_f;
        // Population variance, matching the MSE normalization
        let var_y = y_true[..n]
            .iter()
            .map(|t| (t - mean_y).powi(2))
            .sum::<f64>()
            / n_f;
        let r2 = if var_y > 0.0 {
            Some(1.0 - mse / var_y)
        } else {
            None
        };

        Self {
            mae,
            mse,
            rmse: mse.sqrt(),
            mape: pct_sum / n_f * 100.0,
            r2,
        }
    }

    /// Average across folds. R² is averaged over the folds where it is defined.
    pub fn mean(records: &[RegressionMetrics]) -> Self {
        if records.is_empty() {
            return Self::calculate(&[], &[]);
        }
        let n = records.len() as f64;
        let defined_r2: Vec<f64> = records.iter().filter_map(|m| m.r2).collect();
        let r2 = if defined_r2.is_empty() {
            None
        } else {
            Some(defined_r2.iter().sum::<f64>() / defined_r2.len() as f64)
        };

        Self {
            mae: records.iter().map(|m| m.mae).sum::<f64>() / n,
            mse: records.iter().map(|m| m.mse).sum::<f64>() / n,
            rmse: records.iter().map(|m| m.rmse).sum::<f64>() / n,
            mape: records.iter().map(|m| m.mape).sum::<f64>() / n,
            r2,
        }
    }

    pub fn value(&self, objective: RegressionObjective) -> Option<f64> {
        let value = match objective {
            RegressionObjective::Rmse => Some(self.rmse),
            RegressionObjective::Mae => Some(self.mae),
            RegressionObjective::Mape => Some(self.mape),
            RegressionObjective::R2 => self.r2,
        };
        value.filter(|v| !v.is_nan())
    }
}

/// Metric used to pick the best regression predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegressionObjective {
    #[default]
    Rmse,
    Mae,
    Mape,
    R2,
}

impl RegressionObjective {
    /// R² is maximized, the error metrics are minimized.
    pub fn higher_is_better(self) -> bool {
        matches!(self, RegressionObjective::R2)
    }
}

impl fmt::Display for RegressionObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegressionObjective::Rmse => write!(f, "RMSE"),
            RegressionObjective::Mae => write!(f, "MAE"),
            RegressionObjective::Mape => write!(f, "MAPE"),
            RegressionObjective::R2 => write!(f, "R2"),
        }
    }
}

impl FromStr for RegressionObjective {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "RMSE" => Ok(RegressionObjective::Rmse),
            "MAE" => Ok(RegressionObjective::Mae),
            "MAPE" => Ok(RegressionObjective::Mape),
            "R2" | "R²" => Ok(RegressionObjective::R2),
            _ => anyhow::bail!(
                "Invalid objective: {}. Must be 'RMSE', 'MAE', 'MAPE', or 'R2'",
                s
            ),
        }
    }
}

/// 2x2 confusion matrix. Rows are true {down, up}, columns predicted {down, up}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    /// Labels other than 0 count as up.
    pub fn from_labels(y_true: &[u8], y_pred: &[u8]) -> Self {
        let mut counts = [[0usize; 2]; 2];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            counts[usize::from(t != 0)][usize::from(p != 0)] += 1;
        }
        Self { counts }
    }

    pub fn true_negatives(&self) -> usize {
        self.counts[0][0]
    }

    pub fn false_positives(&self) -> usize {
        self.counts[0][1]
    }

    pub fn false_negatives(&self) -> usize {
        self.counts[1][0]
    }

    pub fn true_positives(&self) -> usize {
        self.counts[1][1]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl ClassificationMetrics {
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let tp = cm.true_positives() as f64;
        let tn = cm.true_negatives() as f64;
        let fp = cm.false_positives() as f64;
        let fn_ = cm.false_negatives() as f64;

        let accuracy = (tp + tn) / (cm.total().max(1) as f64);
        let precision = tp / (tp + fp).max(1.0);
        let recall = tp / (tp + fn_).max(1.0);
        let f1 = 2.0 * precision * recall / (precision + recall).max(METRIC_EPSILON);

        Self {
            accuracy,
            precision,
            recall,
            f1,
        }
    }

    pub fn calculate(y_true: &[u8], y_pred: &[u8]) -> Self {
        Self::from_confusion(&ConfusionMatrix::from_labels(y_true, y_pred))
    }

    pub fn mean(records: &[ClassificationMetrics]) -> Self {
        if records.is_empty() {
            return Self::default();
        }
        let n = records.len() as f64;
        Self {
            accuracy: records.iter().map(|m| m.accuracy).sum::<f64>() / n,
            precision: records.iter().map(|m| m.precision).sum::<f64>() / n,
            recall: records.iter().map(|m| m.recall).sum::<f64>() / n,
            f1: records.iter().map(|m| m.f1).sum::<f64>() / n,
        }
    }
}

/// Binary decisions from scores: `score >= threshold` is up.
pub fn apply_threshold(scores: &[f64], threshold: f64) -> Vec<u8> {
    scores.iter().map(|&s| u8::from(s >= threshold)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_regression_forecast() {
        let y = vec![0.01, -0.02, 0.03, -0.005];
        let m = RegressionMetrics::calculate(&y, &y);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mape, 0.0);
        assert_eq!(m.r2, Some(1.0));
    }

    #[test]
    fn test_regression_metrics_known_values() {
        let y_true = vec![1.0, 2.0, 3.0];
        let y_pred = vec![2.0, 2.0, 2.0];
        let m = RegressionMetrics::calculate(&y_true, &y_pred);
        assert!((m.mae - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.mse - 2.0 / 3.0).abs() < 1e-12);
        // var(y) = 2/3 -> R² = 0
        assert!(m.r2.unwrap().abs() < 1e-12);
        // (1/1 + 0/2 + 1/3) / 3 * 100
        assert!((m.mape - (4.0 / 9.0) * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_r2_undefined_for_constant_target() {
        let m = RegressionMetrics::calculate(&[0.0, 0.0, 0.0], &[0.1, 0.0, -0.1]);
        assert_eq!(m.r2, None);
        assert_eq!(m.value(RegressionObjective::R2), None);
        // zero true values use the epsilon denominator instead of dividing by zero
        assert!(m.mape.is_finite());
    }

    #[test]
    fn test_mean_skips_undefined_r2() {
        let a = RegressionMetrics {
            mae: 1.0,
            mse: 1.0,
            rmse: 1.0,
            mape: 10.0,
            r2: Some(0.5),
        };
        let b = RegressionMetrics {
            mae: 3.0,
            mse: 9.0,
            rmse: 3.0,
            mape: 30.0,
            r2: None,
        };
        let m = RegressionMetrics::mean(&[a, b]);
        assert_eq!(m.mae, 2.0);
        assert_eq!(m.rmse, 2.0);
        assert_eq!(m.r2, Some(0.5));
    }

    #[test]
    fn test_confusion_matrix_layout() {
        let y_true = vec![0, 0, 1, 1, 1];
        let y_pred = vec![0, 1, 0, 1, 1];
        let cm = ConfusionMatrix::from_labels(&y_true, &y_pred);
        assert_eq!(cm.true_negatives(), 1);
        assert_eq!(cm.false_positives(), 1);
        assert_eq!(cm.false_negatives(), 1);
        assert_eq!(cm.true_positives(), 2);
        assert_eq!(cm.total(), 5);

        let m = ClassificationMetrics::from_confusion(&cm);
        assert!((m.accuracy - 0.6).abs() < 1e-12);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_positive_predictions_gives_zero_f1() {
        let m = ClassificationMetrics::calculate(&[0, 0, 1], &[0, 0, 0]);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
        assert!((m.accuracy - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_objective_parsing() {
        assert_eq!("rmse".parse::<RegressionObjective>().unwrap(), RegressionObjective::Rmse);
        assert_eq!("R2".parse::<RegressionObjective>().unwrap(), RegressionObjective::R2);
        assert!("sharpe".parse::<RegressionObjective>().is_err());
        assert!(RegressionObjective::R2.higher_is_better());
        assert!(!RegressionObjective::Mape.higher_is_better());
    }

    #[test]
    fn test_apply_threshold_is_inclusive() {
        assert_eq!(apply_threshold(&[0.2, 0.5, 0.7], 0.5), vec![0, 1, 1]);
    }
}
