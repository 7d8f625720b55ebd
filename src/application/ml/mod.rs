pub mod gradient_boosting;
pub mod logistic;
pub mod random_forest;
pub mod registry;
pub mod ridge;
pub mod scaler;
pub mod scores;

pub use registry::{PredictorKind, PredictorRegistry};
pub use scores::{ScoreSource, positive_scores};

use crate::domain::errors::PredictorError;
use smartcore::linalg::basic::matrix::DenseMatrix;

pub(crate) fn to_dense(model: &str, rows: &[Vec<f64>]) -> Result<DenseMatrix<f64>, PredictorError> {
    DenseMatrix::from_2d_vec(&rows.to_vec()).map_err(|e| PredictorError::InvalidInput {
        model: model.to_string(),
        reason: format!("Matrix creation failed: {}", e),
    })
}

/// Direction targets as class ids (anything above 0.5 is "up").
pub(crate) fn class_labels(targets: &[f64]) -> Vec<i32> {
    targets.iter().map(|&t| i32::from(t > 0.5)).collect()
}

/// The only class present, if training data contains just one.
pub(crate) fn single_class(labels: &[i32]) -> Option<i32> {
    let first = *labels.first()?;
    labels.iter().all(|&l| l == first).then_some(first)
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_class_detection() {
        assert_eq!(single_class(&[1, 1, 1]), Some(1));
        assert_eq!(single_class(&[0, 1]), None);
        assert_eq!(single_class(&[]), None);
    }

    #[test]
    fn test_class_labels() {
        assert_eq!(class_labels(&[0.0, 1.0, 0.4, 0.9]), vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_sigmoid_midpoint() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(40.0) > 0.999);
    }
}
